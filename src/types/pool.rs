//! Pool-related types
//!
//! Liquidity pools hold an ordered token pair with reserves and minted
//! liquidity shares. Yield pools hold a single token with an annual rate
//! and the sum of deposited principal.

use super::PoolId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of pool held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Constant-product pool over a token pair
    Liquidity,
    /// Staking or DeFi deposit pool over a single token
    Yield,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Liquidity => write!(f, "liquidity"),
            PoolKind::Yield => write!(f, "yield"),
        }
    }
}

/// Constant-product liquidity pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub id: PoolId,

    /// First token of the ordered pair
    pub token_a: String,

    /// Second token of the ordered pair
    pub token_b: String,

    /// Balance of `token_a` held by the pool
    pub reserve_a: Decimal,

    /// Balance of `token_b` held by the pool
    pub reserve_b: Decimal,

    /// Sum of all liquidity shares minted and not yet burned
    ///
    /// Zero exactly when no active liquidity position exists for the pool.
    pub total_liquidity: Decimal,

    /// Fractional swap fee charged on the input amount (0.003 = 0.3%)
    pub fee: Decimal,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl LiquidityPool {
    /// Create an active pool with the default 0.3% fee and no minted shares
    pub fn new(
        id: impl Into<PoolId>,
        token_a: impl Into<String>,
        token_b: impl Into<String>,
        reserve_a: Decimal,
        reserve_b: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        LiquidityPool {
            id: id.into(),
            token_a: token_a.into(),
            token_b: token_b.into(),
            reserve_a,
            reserve_b,
            total_liquidity: Decimal::ZERO,
            fee: Decimal::new(3, 3),
            is_active: true,
            created_at,
        }
    }

    /// Whether the pool trades the given pair in either orientation
    pub fn trades(&self, token_x: &str, token_y: &str) -> bool {
        (self.token_a == token_x && self.token_b == token_y)
            || (self.token_a == token_y && self.token_b == token_x)
    }

    /// `TOKEN_A/TOKEN_B` label used in logs and errors
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.token_a, self.token_b)
    }
}

/// Staking or DeFi deposit pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPool {
    pub id: PoolId,

    /// Display name, also used to categorize distributed rewards
    pub name: String,

    pub token: String,

    /// Annualized fractional rate (0.08 = 8%)
    pub apy: Decimal,

    /// Sum of principal held by active positions
    pub total_deposits: Decimal,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl YieldPool {
    pub fn new(
        id: impl Into<PoolId>,
        name: impl Into<String>,
        token: impl Into<String>,
        apy: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        YieldPool {
            id: id.into(),
            name: name.into(),
            token: token.into(),
            apy,
            total_deposits: Decimal::ZERO,
            is_active: true,
            created_at,
        }
    }
}

/// Any pool held by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Pool {
    Liquidity(LiquidityPool),
    Yield(YieldPool),
}

impl Pool {
    pub fn id(&self) -> &str {
        match self {
            Pool::Liquidity(pool) => &pool.id,
            Pool::Yield(pool) => &pool.id,
        }
    }

    pub fn kind(&self) -> PoolKind {
        match self {
            Pool::Liquidity(_) => PoolKind::Liquidity,
            Pool::Yield(_) => PoolKind::Yield,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Pool::Liquidity(pool) => pool.is_active,
            Pool::Yield(pool) => pool.is_active,
        }
    }

    pub fn as_liquidity(&self) -> Option<&LiquidityPool> {
        match self {
            Pool::Liquidity(pool) => Some(pool),
            Pool::Yield(_) => None,
        }
    }

    pub fn as_yield(&self) -> Option<&YieldPool> {
        match self {
            Pool::Yield(pool) => Some(pool),
            Pool::Liquidity(_) => None,
        }
    }
}
