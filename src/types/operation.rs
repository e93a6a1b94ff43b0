//! Replayable ledger operations
//!
//! An `Operation` is one call into one engine, as read from a replay file by
//! the CLI driver. Request and escrow rows carry a caller-chosen label so later
//! rows can refer to the record without knowing the id the store allocated.

use super::OwnerId;
use rust_decimal::Decimal;

/// One operation against the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddLiquidity {
        owner: OwnerId,
        pool: String,
        token_a: String,
        token_b: String,
        amount_a: Decimal,
        amount_b: Decimal,
    },
    RemoveLiquidity {
        owner: OwnerId,
        pool: String,
        shares: Decimal,
    },
    Swap {
        owner: OwnerId,
        from_token: String,
        to_token: String,
        amount_in: Decimal,
    },
    Deposit {
        owner: OwnerId,
        pool: String,
        amount: Decimal,
    },
    Withdraw {
        owner: OwnerId,
        pool: String,
        amount: Decimal,
    },
    Send {
        sender: OwnerId,
        recipient: OwnerId,
        amount: Decimal,
        description: Option<String>,
    },
    Request {
        requester: OwnerId,
        recipient: OwnerId,
        amount: Decimal,
        label: String,
    },
    Fulfill {
        fulfiller: OwnerId,
        label: String,
    },
    Cancel {
        actor: OwnerId,
        label: String,
    },
    Escrow {
        buyer: OwnerId,
        seller: OwnerId,
        amount: Decimal,
        item: String,
    },
    Release {
        releaser: OwnerId,
        item: String,
    },
    /// Run one reward distribution sweep
    Tick,
    /// Move the replay clock forward by whole days
    Advance { days: i64 },
}

impl Operation {
    /// Name of the operation as written in replay files
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddLiquidity { .. } => "add_liquidity",
            Operation::RemoveLiquidity { .. } => "remove_liquidity",
            Operation::Swap { .. } => "swap",
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdraw",
            Operation::Send { .. } => "send",
            Operation::Request { .. } => "request",
            Operation::Fulfill { .. } => "fulfill",
            Operation::Cancel { .. } => "cancel",
            Operation::Escrow { .. } => "escrow",
            Operation::Release { .. } => "release",
            Operation::Tick => "tick",
            Operation::Advance { .. } => "advance",
        }
    }

    /// Whether the operation touches every pool and must run alone
    pub fn is_barrier(&self) -> bool {
        matches!(self, Operation::Tick | Operation::Advance { .. })
    }
}
