//! Append-only ledger records
//!
//! Reward and swap records are written once and never mutated or deleted.

use super::{OwnerId, PoolId, RecordId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a distributed reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardCategory {
    Staking,
    Liquidity,
    Farming,
}

impl RewardCategory {
    /// Categorize a reward by the name of the pool paying it
    ///
    /// Pools named "...Liquidity..." pay liquidity rewards, "...Farming..."
    /// pay farming rewards, everything else pays staking rewards.
    pub fn for_pool_name(name: &str) -> Self {
        if name.contains("Liquidity") {
            RewardCategory::Liquidity
        } else if name.contains("Farming") {
            RewardCategory::Farming
        } else {
            RewardCategory::Staking
        }
    }
}

impl fmt::Display for RewardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardCategory::Staking => write!(f, "staking"),
            RewardCategory::Liquidity => write!(f, "liquidity"),
            RewardCategory::Farming => write!(f, "farming"),
        }
    }
}

/// How a reward came to be credited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    /// Distribution tick over yield positions
    Hourly,
    /// Daily distribution over term stakes
    Daily,
    /// Settlement paid when a position or stake is closed
    Maturity,
}

/// One reward credited to a yield position or term stake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub id: RecordId,
    pub owner: OwnerId,

    /// Yield position or term stake credited
    pub position_id: RecordId,
    pub pool_id: PoolId,
    pub amount: Decimal,
    pub category: RewardCategory,
    pub kind: RewardKind,
    pub rewarded_at: DateTime<Utc>,
}

/// An executed swap against a liquidity pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapTransaction {
    pub id: RecordId,
    pub owner: OwnerId,
    pub pool_id: PoolId,
    pub from_token: String,
    pub amount_in: Decimal,
    pub to_token: String,
    pub amount_out: Decimal,

    /// Fee charged on the input side (`amount_in * pool.fee`)
    pub fee: Decimal,

    pub executed_at: DateTime<Utc>,
}
