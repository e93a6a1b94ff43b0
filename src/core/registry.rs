//! Pool catalog
//!
//! The `PoolRegistry` seeds the default liquidity and yield pools the first
//! time a ledger starts and answers catalog queries for the engines.
//!
//! Seeded liquidity is owned by the treasury: seeding mints
//! `sqrt(reserve_a * reserve_b)` shares to a treasury position, so a pool with
//! reserves always has outstanding shares and an active position backing them.

use crate::core::amm;
use crate::core::store::Ledger;
use crate::core::traits::{Clock, RecordStore};
use crate::types::{LiquidityPool, LiquidityPosition, Pool, PoolKind, YieldPool};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Catalog of liquidity and yield pools
#[derive(Clone)]
pub struct PoolRegistry {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    treasury: String,
}

impl PoolRegistry {
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>, treasury: impl Into<String>) -> Self {
        PoolRegistry {
            ledger,
            clock,
            treasury: treasury.into(),
        }
    }

    /// Insert the default catalog if the ledger holds no pools
    ///
    /// Safe to call on every startup. Returns the number of pools inserted.
    pub fn ensure_seeded(&self) -> usize {
        if !self.ledger.pools.is_empty() {
            return 0;
        }

        let now = self.clock.now();
        let mut inserted = 0;

        for pool in default_liquidity_pools(now) {
            let pool_id = pool.id.clone();
            if self.seed_liquidity_pool(pool, now) {
                inserted += 1;
            } else {
                info!(pool = %pool_id, "Pool already present, skipping seed");
            }
        }

        for pool in default_yield_pools(now) {
            if self.ledger.pools.insert(Pool::Yield(pool)) {
                inserted += 1;
            }
        }

        if inserted > 0 {
            info!(pools = inserted, treasury = %self.treasury, "Initialized default pools");
        }
        inserted
    }

    /// Insert a liquidity pool and mint its reserves to the treasury
    fn seed_liquidity_pool(&self, mut pool: LiquidityPool, now: DateTime<Utc>) -> bool {
        let seeded_shares = if pool.reserve_a > Decimal::ZERO && pool.reserve_b > Decimal::ZERO {
            amm::mint_shares(
                pool.reserve_a,
                pool.reserve_b,
                Decimal::ZERO,
                Decimal::ZERO,
                Decimal::ZERO,
            )
            .unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        pool.total_liquidity = seeded_shares;

        let position = LiquidityPosition {
            id: self.ledger.next_id(),
            owner: self.treasury.clone(),
            pool_id: pool.id.clone(),
            token_a: pool.token_a.clone(),
            token_b: pool.token_b.clone(),
            amount_a: pool.reserve_a,
            amount_b: pool.reserve_b,
            liquidity_shares: seeded_shares,
            opened_at: now,
            is_active: true,
            closed_at: None,
        };

        if !self.ledger.pools.insert(Pool::Liquidity(pool)) {
            return false;
        }
        if seeded_shares > Decimal::ZERO {
            self.ledger.liquidity_positions.insert(position);
        }
        true
    }

    /// All active pools of a kind, in no guaranteed order
    pub fn list_active(&self, kind: PoolKind) -> Vec<Pool> {
        self.ledger
            .pools
            .find(|pool| pool.kind() == kind && pool.is_active())
    }

    /// Look up a pool by id, active or not
    pub fn get(&self, pool_id: &str) -> Option<Pool> {
        self.ledger.pools.get(&pool_id.to_string())
    }

    /// Active liquidity pool trading the pair in either orientation
    ///
    /// When several pools match, the one with the smallest id is returned so
    /// routing is deterministic.
    pub fn find_pair(&self, token_x: &str, token_y: &str) -> Option<LiquidityPool> {
        self.ledger
            .pools
            .find(|pool| {
                pool.as_liquidity()
                    .is_some_and(|p| p.is_active && p.trades(token_x, token_y))
            })
            .into_iter()
            .filter_map(|pool| match pool {
                Pool::Liquidity(p) => Some(p),
                Pool::Yield(_) => None,
            })
            .min_by(|a, b| a.id.cmp(&b.id))
    }

    /// Every pool, active or not, sorted by id
    pub fn snapshot(&self) -> Vec<Pool> {
        let mut pools = self.ledger.pools.find(|_| true);
        pools.sort_by(|a, b| a.id().cmp(b.id()));
        pools
    }

    pub fn treasury(&self) -> &str {
        &self.treasury
    }
}

fn default_liquidity_pools(now: DateTime<Utc>) -> Vec<LiquidityPool> {
    vec![
        LiquidityPool::new("AZR-ETH", "AZR", "ETH", Decimal::from(10000), Decimal::from(10), now),
        LiquidityPool::new(
            "AZR-USDC",
            "AZR",
            "USDC",
            Decimal::from(10000),
            Decimal::from(10000),
            now,
        ),
        LiquidityPool::new("ETH-USDC", "ETH", "USDC", Decimal::from(10), Decimal::from(2000), now),
    ]
}

fn default_yield_pools(now: DateTime<Utc>) -> Vec<YieldPool> {
    vec![
        YieldPool::new("azr-staking", "AZR Staking Pool", "AZR", Decimal::new(8, 2), now),
        YieldPool::new("liquidity-mining", "Liquidity Mining", "AZR-ETH", Decimal::new(15, 2), now),
        YieldPool::new("yield-farming", "Yield Farming", "AZR", Decimal::new(12, 2), now),
        YieldPool::new("high-yield", "High Yield Pool", "AZR", Decimal::new(20, 2), now),
    ]
}
