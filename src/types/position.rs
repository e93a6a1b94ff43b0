//! Position types
//!
//! A position is an owner's stake in one pool. Positions are created on
//! deposit, mutated on accrual or partial withdrawal, and marked inactive
//! (never deleted) once fully withdrawn. A closed position is never
//! mutated again.

use super::{OwnerId, PoolId, RecordId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Liquidity provided to a constant-product pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub id: RecordId,
    pub owner: OwnerId,
    pub pool_id: PoolId,
    pub token_a: String,
    pub token_b: String,

    /// Amount of `token_a` deposited when the position was opened
    pub amount_a: Decimal,

    /// Amount of `token_b` deposited when the position was opened
    pub amount_b: Decimal,

    /// Shares currently held
    ///
    /// Never exceeds the pool's `total_liquidity` while the position is active.
    pub liquidity_shares: Decimal,

    pub opened_at: DateTime<Utc>,
    pub is_active: bool,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Principal deposited into a staking or DeFi pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPosition {
    pub id: RecordId,
    pub owner: OwnerId,
    pub pool_id: PoolId,
    pub principal: Decimal,

    /// Start of the linear reward proration
    pub opened_at: DateTime<Utc>,

    /// Running reward total
    ///
    /// Always equal to the sum of the position's reward records. Frozen once
    /// the position closes.
    pub accrued_reward: Decimal,

    pub is_active: bool,
    pub closed_at: Option<DateTime<Utc>>,
}

impl YieldPosition {
    /// Open a position with zero accrued reward
    pub fn open(
        id: RecordId,
        owner: impl Into<OwnerId>,
        pool_id: impl Into<PoolId>,
        principal: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        YieldPosition {
            id,
            owner: owner.into(),
            pool_id: pool_id.into(),
            principal,
            opened_at,
            accrued_reward: Decimal::ZERO,
            is_active: true,
            closed_at: None,
        }
    }
}

/// Lifecycle of a term stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    Active,
    /// Unstake requested, principal locked until `unbonding_until`
    Unstaking,
    Completed,
}

impl fmt::Display for StakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeStatus::Active => write!(f, "active"),
            StakeStatus::Unstaking => write!(f, "unstaking"),
            StakeStatus::Completed => write!(f, "completed"),
        }
    }
}

/// AZR locked for a fixed term at a duration-tiered rate
///
/// Term stakes live outside the pool catalog: they never change a pool's
/// `total_deposits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStake {
    pub id: RecordId,
    pub owner: OwnerId,
    pub amount: Decimal,
    pub duration_days: i64,

    /// Annual rate fixed by the duration tier at creation
    pub apy: Decimal,

    pub opened_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,

    /// Running reward total, equal to the sum of the stake's reward records
    pub accrued_reward: Decimal,

    pub status: StakeStatus,
    pub unstake_requested_at: Option<DateTime<Utc>>,
    pub unbonding_until: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
