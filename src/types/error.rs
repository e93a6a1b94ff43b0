//! Error types for the token economy engine
//!
//! This module defines all error types that can occur while operating on
//! pools, positions and payments, plus the parsing errors raised by the
//! replay driver.
//!
//! # Error Categories
//!
//! - **Validation Errors**: Non-positive amounts, token pair mismatches, stake terms
//! - **Lookup Errors**: Missing or inactive pools, positions, stakes, requests, escrows
//! - **Balance Errors**: Requested shares, principal or swap output not available
//! - **Workflow Errors**: Already processed records, unauthorized actors
//! - **Arithmetic Errors**: Decimal overflow in ledger calculations
//! - **Replay Errors**: CSV parse errors, unknown operations

use super::RecordId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger
///
/// Every variant carries enough context to distinguish the failure
/// programmatically. No error is retried by the engines; each is terminal
/// for the current call and leaves the ledger unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount was zero or negative
    #[error("Invalid amount {amount} for {operation}: must be positive")]
    InvalidAmount {
        /// Operation that rejected the amount
        operation: String,
        /// The rejected amount
        amount: Decimal,
    },

    /// Pool is missing, inactive, or of the wrong kind
    #[error("Pool '{pool}' not found or inactive")]
    PoolNotFound {
        /// Pool identifier
        pool: String,
    },

    /// Owner has no active position in the pool
    #[error("No active position for owner '{owner}' in pool '{pool}'")]
    PositionNotFound {
        /// Owner identifier
        owner: String,
        /// Pool identifier
        pool: String,
    },

    /// Amount is positive but under the operation's floor
    #[error("Amount {amount} for {operation} is below the minimum of {minimum}")]
    BelowMinimum {
        /// Operation that rejected the amount
        operation: String,
        /// The rejected amount
        amount: Decimal,
        /// Smallest accepted amount
        minimum: Decimal,
    },

    /// Owner has no term stake with this id
    #[error("Term stake {stake} not found for '{owner}'")]
    StakeNotFound {
        /// Stake identifier
        stake: RecordId,
        /// Owner that looked it up
        owner: String,
    },

    /// Stake duration outside the allowed term range
    #[error("Invalid stake duration {days} days: must be between {min} and {max}")]
    InvalidDuration {
        /// Requested duration in days
        days: i64,
        /// Shortest allowed term
        min: i64,
        /// Longest allowed term
        max: i64,
    },

    /// No pending payment request matches
    #[error("Payment request {request} not found for '{actor}'")]
    RequestNotFound {
        /// Request identifier
        request: RecordId,
        /// Actor that looked it up
        actor: String,
    },

    /// No escrow payment matches
    #[error("Escrow payment {escrow} not found")]
    EscrowNotFound {
        /// Escrow identifier
        escrow: RecordId,
    },

    /// Supplied token pair does not match the pool's ordered pair
    #[error("Token pair {actual} does not match pool '{pool}' ({expected})")]
    TokenMismatch {
        /// Pool identifier
        pool: String,
        /// Pair stored on the pool
        expected: String,
        /// Pair supplied by the caller
        actual: String,
    },

    /// No active liquidity pool trades the pair
    #[error("No liquidity pool found for {from_token}/{to_token}")]
    NoPoolForPair {
        /// Input token
        from_token: String,
        /// Output token
        to_token: String,
    },

    /// More shares requested than the position holds
    #[error("Insufficient shares for owner '{owner}': held {held}, requested {requested}")]
    InsufficientShares {
        /// Owner identifier
        owner: String,
        /// Shares held by the position
        held: Decimal,
        /// Shares requested
        requested: Decimal,
    },

    /// More principal requested than the position holds
    #[error(
        "Insufficient principal for owner '{owner}': deposited {principal}, requested {requested}"
    )]
    InsufficientPrincipal {
        /// Owner identifier
        owner: String,
        /// Principal held by the position
        principal: Decimal,
        /// Amount requested
        requested: Decimal,
    },

    /// Swap would produce no output
    #[error("Insufficient liquidity in pool '{pool}' for input {amount_in}")]
    InsufficientLiquidity {
        /// Pool identifier
        pool: String,
        /// Input amount of the swap
        amount_in: Decimal,
    },

    /// Escrow or request has already been finalized
    #[error("{entity} {id} already processed (status: {status})")]
    AlreadyProcessed {
        /// Kind of record ("Escrow payment", "Payment request")
        entity: String,
        /// Record identifier
        id: RecordId,
        /// Current status of the record
        status: String,
    },

    /// Actor has no rights over the record
    #[error("'{actor}' is not authorized to {operation} {id}")]
    Unauthorized {
        /// Actor identifier
        actor: String,
        /// Operation attempted
        operation: String,
        /// Record identifier
        id: RecordId,
    },

    /// Decimal arithmetic overflowed
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// CSV parsing error occurred
    ///
    /// This is a recoverable error - the malformed record is skipped
    /// and replay continues with the next record.
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// Unknown replay operation or missing field for a known one
    #[error("Invalid operation '{op}': {reason}")]
    InvalidOperation {
        /// Operation name as read
        op: String,
        /// Why it was rejected
        reason: String,
    },
}

// Conversion from csv::Error to LedgerError
impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(operation: &str, amount: Decimal) -> Self {
        LedgerError::InvalidAmount {
            operation: operation.to_string(),
            amount,
        }
    }

    /// Create a PoolNotFound error
    pub fn pool_not_found(pool: &str) -> Self {
        LedgerError::PoolNotFound {
            pool: pool.to_string(),
        }
    }

    /// Create a PositionNotFound error
    pub fn position_not_found(owner: &str, pool: &str) -> Self {
        LedgerError::PositionNotFound {
            owner: owner.to_string(),
            pool: pool.to_string(),
        }
    }

    /// Create a BelowMinimum error
    pub fn below_minimum(operation: &str, amount: Decimal, minimum: Decimal) -> Self {
        LedgerError::BelowMinimum {
            operation: operation.to_string(),
            amount,
            minimum,
        }
    }

    /// Create a StakeNotFound error
    pub fn stake_not_found(stake: RecordId, owner: &str) -> Self {
        LedgerError::StakeNotFound {
            stake,
            owner: owner.to_string(),
        }
    }

    /// Create an InvalidDuration error
    pub fn invalid_duration(days: i64, min: i64, max: i64) -> Self {
        LedgerError::InvalidDuration { days, min, max }
    }

    /// Create a RequestNotFound error
    pub fn request_not_found(request: RecordId, actor: &str) -> Self {
        LedgerError::RequestNotFound {
            request,
            actor: actor.to_string(),
        }
    }

    /// Create an EscrowNotFound error
    pub fn escrow_not_found(escrow: RecordId) -> Self {
        LedgerError::EscrowNotFound { escrow }
    }

    /// Create a TokenMismatch error
    pub fn token_mismatch(pool: &str, expected: &str, actual: &str) -> Self {
        LedgerError::TokenMismatch {
            pool: pool.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a NoPoolForPair error
    pub fn no_pool_for_pair(from_token: &str, to_token: &str) -> Self {
        LedgerError::NoPoolForPair {
            from_token: from_token.to_string(),
            to_token: to_token.to_string(),
        }
    }

    /// Create an InsufficientShares error
    pub fn insufficient_shares(owner: &str, held: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientShares {
            owner: owner.to_string(),
            held,
            requested,
        }
    }

    /// Create an InsufficientPrincipal error
    pub fn insufficient_principal(owner: &str, principal: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientPrincipal {
            owner: owner.to_string(),
            principal,
            requested,
        }
    }

    /// Create an InsufficientLiquidity error
    pub fn insufficient_liquidity(pool: &str, amount_in: Decimal) -> Self {
        LedgerError::InsufficientLiquidity {
            pool: pool.to_string(),
            amount_in,
        }
    }

    /// Create an AlreadyProcessed error
    pub fn already_processed(entity: &str, id: RecordId, status: impl ToString) -> Self {
        LedgerError::AlreadyProcessed {
            entity: entity.to_string(),
            id,
            status: status.to_string(),
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(actor: &str, operation: &str, id: RecordId) -> Self {
        LedgerError::Unauthorized {
            actor: actor.to_string(),
            operation: operation.to_string(),
            id,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(op: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidOperation {
            op: op.to_string(),
            reason: reason.into(),
        }
    }
}
