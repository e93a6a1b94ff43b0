//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `pool`: Liquidity and yield pool records
//! - `position`: Liquidity and yield positions, and term stakes, held by owners
//! - `record`: Append-only reward and swap records
//! - `payment`: Payment transactions and payment requests
//! - `operation`: Replayable operations consumed by the CLI driver
//! - `error`: Error types for the ledger

pub mod error;
pub mod operation;
pub mod payment;
pub mod pool;
pub mod position;
pub mod record;

pub use error::LedgerError;
pub use operation::Operation;
pub use payment::{PaymentRequest, PaymentStatus, PaymentTransaction, RequestStatus};
pub use pool::{LiquidityPool, Pool, PoolKind, YieldPool};
pub use position::{LiquidityPosition, StakeStatus, TermStake, YieldPosition};
pub use record::{RewardCategory, RewardKind, RewardRecord, SwapTransaction};

/// Owner identifier
///
/// Already-authenticated user id supplied by the surrounding application.
pub type OwnerId = String;

/// Pool identifier
///
/// Stable slug such as `AZR-ETH` or `azr-staking`.
pub type PoolId = String;

/// Record identifier allocated by the ledger store
pub type RecordId = u64;
