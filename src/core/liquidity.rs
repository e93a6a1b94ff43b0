//! Constant-product liquidity engine
//!
//! This module provides the `LiquidityEngine`, which adds and removes
//! liquidity, executes swaps and values positions. Every mutation runs inside
//! the pool's record lock, so concurrent operations on one pool never
//! interleave their reads and writes of `reserve_a`, `reserve_b` and
//! `total_liquidity`.
//!
//! The engine enforces:
//! - Positive amounts for every deposit, burn and swap
//! - Order-sensitive token pair matching on deposit
//! - Shares burned never exceed the shares a position holds
//! - `total_liquidity == 0` exactly when the pool has no active position

use crate::core::amm::{self, add, SwapQuote};
use crate::core::registry::PoolRegistry;
use crate::core::store::Ledger;
use crate::core::traits::{Clock, PriceOracle, RecordStore};
use crate::types::{
    LedgerError, LiquidityPool, LiquidityPosition, Pool, RecordId, SwapTransaction,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successful `add_liquidity`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddLiquidityReceipt {
    pub position_id: RecordId,
    pub liquidity_shares: Decimal,
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
    pub total_liquidity: Decimal,
}

/// Result of a successful `remove_liquidity`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveLiquidityReceipt {
    pub position_id: RecordId,
    pub token_a: String,
    pub amount_a: Decimal,
    pub token_b: String,
    pub amount_b: Decimal,
    pub remaining_shares: Decimal,
}

/// Result of a successful `swap`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapReceipt {
    pub transaction_id: RecordId,
    pub pool_id: String,
    pub from_token: String,
    pub to_token: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub fee: Decimal,

    /// Percentage shortfall against the spot-price output
    pub price_impact: Decimal,
}

/// A liquidity position with its current value in the pool's base token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityPositionView {
    pub position: LiquidityPosition,
    pub current_value: Decimal,
}

/// Constant-product AMM over the registry's liquidity pools
#[derive(Clone)]
pub struct LiquidityEngine {
    ledger: Arc<Ledger>,
    registry: PoolRegistry,
    clock: Arc<dyn Clock>,
    oracle: Arc<dyn PriceOracle>,
}

/// Borrow an active liquidity pool out of a pool record
fn active_liquidity<'a>(
    pool: &'a mut Pool,
    pool_id: &str,
) -> Result<&'a mut LiquidityPool, LedgerError> {
    match pool {
        Pool::Liquidity(p) if p.is_active => Ok(p),
        _ => Err(LedgerError::pool_not_found(pool_id)),
    }
}

impl LiquidityEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        registry: PoolRegistry,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        LiquidityEngine {
            ledger,
            registry,
            clock,
            oracle,
        }
    }

    /// Deposit both sides of a pair and mint liquidity shares
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either amount is zero or negative (`InvalidAmount`)
    /// - The pool is missing, inactive or not a liquidity pool (`PoolNotFound`)
    /// - `token_a`/`token_b` differ from the pool's ordered pair (`TokenMismatch`)
    pub fn add_liquidity(
        &self,
        owner: &str,
        pool_id: &str,
        token_a: &str,
        token_b: &str,
        amount_a: Decimal,
        amount_b: Decimal,
    ) -> Result<AddLiquidityReceipt, LedgerError> {
        if amount_a <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("add_liquidity", amount_a));
        }
        if amount_b <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("add_liquidity", amount_b));
        }

        let now = self.clock.now();
        let receipt = self
            .ledger
            .pools
            .update(&pool_id.to_string(), |pool| {
                let pool = active_liquidity(pool, pool_id)?;

                if pool.token_a != token_a || pool.token_b != token_b {
                    return Err(LedgerError::token_mismatch(
                        pool_id,
                        &pool.pair_label(),
                        &format!("{}/{}", token_a, token_b),
                    ));
                }

                let shares = amm::mint_shares(
                    amount_a,
                    amount_b,
                    pool.reserve_a,
                    pool.reserve_b,
                    pool.total_liquidity,
                )?;
                if shares <= Decimal::ZERO {
                    return Err(LedgerError::invalid_amount("add_liquidity", shares));
                }

                let reserve_a = add(pool.reserve_a, amount_a, "add_liquidity")?;
                let reserve_b = add(pool.reserve_b, amount_b, "add_liquidity")?;
                let total_liquidity = add(pool.total_liquidity, shares, "add_liquidity")?;

                let position = LiquidityPosition {
                    id: self.ledger.next_id(),
                    owner: owner.to_string(),
                    pool_id: pool_id.to_string(),
                    token_a: token_a.to_string(),
                    token_b: token_b.to_string(),
                    amount_a,
                    amount_b,
                    liquidity_shares: shares,
                    opened_at: now,
                    is_active: true,
                    closed_at: None,
                };
                let position_id = position.id;

                pool.reserve_a = reserve_a;
                pool.reserve_b = reserve_b;
                pool.total_liquidity = total_liquidity;
                self.ledger.liquidity_positions.insert(position);

                Ok(AddLiquidityReceipt {
                    position_id,
                    liquidity_shares: shares,
                    reserve_a,
                    reserve_b,
                    total_liquidity,
                })
            })
            .unwrap_or_else(|| Err(LedgerError::pool_not_found(pool_id)))?;

        info!(
            owner,
            pool = pool_id,
            position = receipt.position_id,
            shares = %receipt.liquidity_shares,
            "Liquidity added"
        );
        Ok(receipt)
    }

    /// Burn shares from the owner's oldest active position in the pool
    ///
    /// Liquidity can be withdrawn from a deactivated pool. When the burn
    /// closes the pool's last active position, the whole of both reserves is
    /// returned and `total_liquidity` drops to exactly zero.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `shares` is zero or negative (`InvalidAmount`)
    /// - The owner has no active position in the pool (`PositionNotFound`)
    /// - `shares` exceeds the position's shares (`InsufficientShares`)
    pub fn remove_liquidity(
        &self,
        owner: &str,
        pool_id: &str,
        shares: Decimal,
    ) -> Result<RemoveLiquidityReceipt, LedgerError> {
        if shares <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("remove_liquidity", shares));
        }

        let now = self.clock.now();
        let receipt = self
            .ledger
            .pools
            .update(&pool_id.to_string(), |pool| {
                let pool = match pool {
                    Pool::Liquidity(p) => p,
                    Pool::Yield(_) => return Err(LedgerError::position_not_found(owner, pool_id)),
                };

                let position = self
                    .oldest_active_position(owner, pool_id)
                    .ok_or_else(|| LedgerError::position_not_found(owner, pool_id))?;

                if shares > position.liquidity_shares {
                    return Err(LedgerError::insufficient_shares(
                        owner,
                        position.liquidity_shares,
                        shares,
                    ));
                }

                let remaining = position.liquidity_shares - shares;
                let last_position = remaining.is_zero()
                    && self
                        .ledger
                        .liquidity_positions
                        .find(|p| p.pool_id == pool_id && p.is_active && p.id != position.id)
                        .is_empty();

                let burned = if last_position {
                    pool.total_liquidity
                } else {
                    shares.min(pool.total_liquidity)
                };
                let (amount_a, amount_b) = amm::redeem_shares(
                    burned,
                    pool.reserve_a,
                    pool.reserve_b,
                    pool.total_liquidity,
                )?;

                self.ledger
                    .liquidity_positions
                    .update(&position.id, |p| {
                        p.liquidity_shares = remaining;
                        if remaining.is_zero() {
                            p.is_active = false;
                            p.closed_at = Some(now);
                        }
                        Ok(())
                    })
                    .unwrap_or_else(|| Err(LedgerError::position_not_found(owner, pool_id)))?;

                pool.reserve_a -= amount_a;
                pool.reserve_b -= amount_b;
                pool.total_liquidity -= burned;

                Ok(RemoveLiquidityReceipt {
                    position_id: position.id,
                    token_a: pool.token_a.clone(),
                    amount_a,
                    token_b: pool.token_b.clone(),
                    amount_b,
                    remaining_shares: remaining,
                })
            })
            .unwrap_or_else(|| Err(LedgerError::position_not_found(owner, pool_id)))?;

        info!(
            owner,
            pool = pool_id,
            position = receipt.position_id,
            amount_a = %receipt.amount_a,
            amount_b = %receipt.amount_b,
            "Liquidity removed"
        );
        Ok(receipt)
    }

    /// Swap an exact input amount through the pool trading the pair
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `amount_in` is zero or negative (`InvalidAmount`)
    /// - No active pool trades the pair in either orientation (`NoPoolForPair`)
    /// - The computed output is not positive (`InsufficientLiquidity`)
    pub fn swap(
        &self,
        owner: &str,
        from_token: &str,
        to_token: &str,
        amount_in: Decimal,
    ) -> Result<SwapReceipt, LedgerError> {
        if amount_in <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("swap", amount_in));
        }

        let routed = self
            .registry
            .find_pair(from_token, to_token)
            .ok_or_else(|| LedgerError::no_pool_for_pair(from_token, to_token))?;

        let now = self.clock.now();
        let receipt = self
            .ledger
            .pools
            .update(&routed.id, |pool| {
                let pool = match pool {
                    Pool::Liquidity(p) if p.is_active && p.trades(from_token, to_token) => p,
                    _ => return Err(LedgerError::no_pool_for_pair(from_token, to_token)),
                };

                let a_to_b = pool.token_a == from_token;
                let (reserve_in, reserve_out) = if a_to_b {
                    (pool.reserve_a, pool.reserve_b)
                } else {
                    (pool.reserve_b, pool.reserve_a)
                };

                let quote = amm::quote_exact_in(amount_in, reserve_in, reserve_out, pool.fee)?;
                if quote.amount_out <= Decimal::ZERO {
                    return Err(LedgerError::insufficient_liquidity(&pool.id, amount_in));
                }

                let new_in = add(reserve_in, amount_in, "swap")?;
                let new_out = reserve_out - quote.amount_out;
                if a_to_b {
                    pool.reserve_a = new_in;
                    pool.reserve_b = new_out;
                } else {
                    pool.reserve_b = new_in;
                    pool.reserve_a = new_out;
                }

                let transaction = SwapTransaction {
                    id: self.ledger.next_id(),
                    owner: owner.to_string(),
                    pool_id: pool.id.clone(),
                    from_token: from_token.to_string(),
                    amount_in,
                    to_token: to_token.to_string(),
                    amount_out: quote.amount_out,
                    fee: quote.fee,
                    executed_at: now,
                };
                let transaction_id = transaction.id;
                self.ledger.swaps.insert(transaction);

                Ok(SwapReceipt {
                    transaction_id,
                    pool_id: pool.id.clone(),
                    from_token: from_token.to_string(),
                    to_token: to_token.to_string(),
                    amount_in,
                    amount_out: quote.amount_out,
                    fee: quote.fee,
                    price_impact: quote.price_impact,
                })
            })
            .unwrap_or_else(|| Err(LedgerError::no_pool_for_pair(from_token, to_token)))?;

        info!(
            owner,
            pool = %receipt.pool_id,
            from = from_token,
            to = to_token,
            amount_in = %amount_in,
            amount_out = %receipt.amount_out,
            "Swap executed"
        );
        Ok(receipt)
    }

    /// Price a swap against the current reserves without executing it
    pub fn quote_swap(
        &self,
        from_token: &str,
        to_token: &str,
        amount_in: Decimal,
    ) -> Result<SwapQuote, LedgerError> {
        if amount_in <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("quote_swap", amount_in));
        }
        let pool = self
            .registry
            .find_pair(from_token, to_token)
            .ok_or_else(|| LedgerError::no_pool_for_pair(from_token, to_token))?;

        let (reserve_in, reserve_out) = if pool.token_a == from_token {
            (pool.reserve_a, pool.reserve_b)
        } else {
            (pool.reserve_b, pool.reserve_a)
        };
        let quote = amm::quote_exact_in(amount_in, reserve_in, reserve_out, pool.fee)?;
        debug!(pool = %pool.id, amount_in = %amount_in, amount_out = %quote.amount_out, "Swap quoted");
        Ok(quote)
    }

    /// Value of a position in the pool's `token_a`
    ///
    /// `share * reserve_a + share * reserve_b * cross_rate`, where the cross
    /// rate converts `token_b` into `token_a`. Inactive positions are worth 0.
    pub fn position_value(
        &self,
        position: &LiquidityPosition,
        pool: &LiquidityPool,
    ) -> Result<Decimal, LedgerError> {
        if !position.is_active || pool.total_liquidity.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let share = amm::div(position.liquidity_shares, pool.total_liquidity, "position_value")?;
        let value_a = amm::mul(share, pool.reserve_a, "position_value")?;
        let value_b = amm::mul(share, pool.reserve_b, "position_value")?;
        let rate = self.oracle.cross_rate(&pool.token_a, &pool.token_b);

        add(value_a, amm::mul(value_b, rate, "position_value")?, "position_value")
    }

    /// Every liquidity position of an owner, with current value, oldest first
    pub fn list_positions(&self, owner: &str) -> Result<Vec<LiquidityPositionView>, LedgerError> {
        let mut positions = self.ledger.liquidity_positions.find(|p| p.owner == owner);
        positions.sort_by_key(|p| p.id);

        positions
            .into_iter()
            .map(|position| {
                let current_value = match self.registry.get(&position.pool_id) {
                    Some(Pool::Liquidity(pool)) => self.position_value(&position, &pool)?,
                    _ => Decimal::ZERO,
                };
                Ok(LiquidityPositionView {
                    position,
                    current_value,
                })
            })
            .collect()
    }

    /// Swap history of an owner, newest first
    pub fn list_swaps(&self, owner: &str) -> Vec<SwapTransaction> {
        let mut swaps = self.ledger.swaps.find(|s| s.owner == owner);
        swaps.sort_by(|a, b| b.id.cmp(&a.id));
        swaps
    }

    fn oldest_active_position(&self, owner: &str, pool_id: &str) -> Option<LiquidityPosition> {
        self.ledger
            .liquidity_positions
            .find(|p| p.owner == owner && p.pool_id == pool_id && p.is_active)
            .into_iter()
            .min_by_key(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::oracle::FixedRateOracle;
    use crate::core::traits::RecordStore;
    use crate::types::{LiquidityPool, PoolKind};
    use chrono::Utc;

    fn engine_with_pool(reserve_a: i64, reserve_b: i64) -> (Arc<Ledger>, LiquidityEngine) {
        let ledger = Arc::new(Ledger::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_epoch());
        let registry = PoolRegistry::new(Arc::clone(&ledger), Arc::clone(&clock), "treasury");
        ledger.pools.insert(Pool::Liquidity(LiquidityPool::new(
            "AZR-ETH",
            "AZR",
            "ETH",
            Decimal::from(reserve_a),
            Decimal::from(reserve_b),
            Utc::now(),
        )));
        let engine = LiquidityEngine::new(
            Arc::clone(&ledger),
            registry,
            clock,
            Arc::new(FixedRateOracle::default()),
        );
        (ledger, engine)
    }

    fn empty_engine() -> (Arc<Ledger>, LiquidityEngine) {
        engine_with_pool(0, 0)
    }

    fn pool(ledger: &Ledger) -> LiquidityPool {
        ledger
            .pools
            .get(&"AZR-ETH".to_string())
            .and_then(|p| p.as_liquidity().cloned())
            .unwrap()
    }

    #[test]
    fn test_first_deposit_bootstraps_shares() {
        let (ledger, engine) = empty_engine();

        let receipt = engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(400), Decimal::from(100))
            .unwrap();

        assert_eq!(receipt.liquidity_shares.round_dp(12), Decimal::from(200));
        let pool = pool(&ledger);
        assert_eq!(pool.reserve_a, Decimal::from(400));
        assert_eq!(pool.reserve_b, Decimal::from(100));
        assert_eq!(pool.total_liquidity, receipt.liquidity_shares);
    }

    #[test]
    fn test_add_liquidity_rejects_non_positive_amounts() {
        let (ledger, engine) = empty_engine();

        let result =
            engine.add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::ZERO, Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));

        let result =
            engine.add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::ONE, -Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
        assert!(ledger.liquidity_positions.is_empty());
    }

    #[test]
    fn test_add_liquidity_is_order_sensitive() {
        let (ledger, engine) = empty_engine();

        let result =
            engine.add_liquidity("alice", "AZR-ETH", "ETH", "AZR", Decimal::ONE, Decimal::ONE);

        assert!(matches!(result, Err(LedgerError::TokenMismatch { .. })));
        assert_eq!(pool(&ledger).total_liquidity, Decimal::ZERO);
    }

    #[test]
    fn test_add_liquidity_unknown_pool() {
        let (_, engine) = empty_engine();

        let result =
            engine.add_liquidity("alice", "AZR-BTC", "AZR", "BTC", Decimal::ONE, Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::PoolNotFound { .. })));
    }

    #[test]
    fn test_add_liquidity_inactive_pool() {
        let (ledger, engine) = empty_engine();
        ledger
            .pools
            .update(&"AZR-ETH".to_string(), |p| {
                if let Pool::Liquidity(p) = p {
                    p.is_active = false;
                }
                Ok(())
            })
            .unwrap()
            .unwrap();

        let result =
            engine.add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::ONE, Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::PoolNotFound { .. })));
    }

    #[test]
    fn test_round_trip_restores_pool() {
        let (ledger, engine) = empty_engine();
        engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(1000), Decimal::from(10))
            .unwrap();
        let before = pool(&ledger);

        let receipt = engine
            .add_liquidity("bob", "AZR-ETH", "AZR", "ETH", Decimal::from(100), Decimal::from(1))
            .unwrap();
        let removed = engine
            .remove_liquidity("bob", "AZR-ETH", receipt.liquidity_shares)
            .unwrap();

        assert!(removed.amount_a <= Decimal::from(100));
        assert!(removed.amount_b <= Decimal::from(1));
        assert_eq!(removed.amount_a.round_dp(12), Decimal::from(100));
        assert_eq!(removed.amount_b.round_dp(12), Decimal::from(1));
        assert_eq!(removed.remaining_shares, Decimal::ZERO);

        let after = pool(&ledger);
        assert_eq!(after.reserve_a.round_dp(12), before.reserve_a);
        assert_eq!(after.reserve_b.round_dp(12), before.reserve_b);
        assert_eq!(after.total_liquidity.round_dp(12), before.total_liquidity.round_dp(12));
    }

    #[test]
    fn test_removing_last_position_zeroes_total_liquidity() {
        let (ledger, engine) = empty_engine();
        let receipt = engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(2), Decimal::from(3))
            .unwrap();

        let removed = engine
            .remove_liquidity("alice", "AZR-ETH", receipt.liquidity_shares)
            .unwrap();

        assert_eq!(removed.amount_a, Decimal::from(2));
        assert_eq!(removed.amount_b, Decimal::from(3));
        let pool = pool(&ledger);
        assert_eq!(pool.total_liquidity, Decimal::ZERO);
        assert_eq!(pool.reserve_a, Decimal::ZERO);
        assert_eq!(pool.reserve_b, Decimal::ZERO);
        assert!(ledger.liquidity_positions.find(|p| p.is_active).is_empty());
    }

    #[test]
    fn test_partial_removal_keeps_position_active() {
        let (ledger, engine) = empty_engine();
        engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(400), Decimal::from(100))
            .unwrap();

        let removed = engine
            .remove_liquidity("alice", "AZR-ETH", Decimal::from(50))
            .unwrap();

        assert!(removed.remaining_shares > Decimal::ZERO);
        let positions = ledger.liquidity_positions.find(|p| p.owner == "alice");
        assert!(positions[0].is_active);
        assert!(positions[0].closed_at.is_none());
        assert!(positions[0].liquidity_shares <= pool(&ledger).total_liquidity);
    }

    #[test]
    fn test_remove_liquidity_errors() {
        let (_, engine) = empty_engine();

        let result = engine.remove_liquidity("alice", "AZR-ETH", Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::PositionNotFound { .. })));

        engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(4), Decimal::from(1))
            .unwrap();
        let result = engine.remove_liquidity("alice", "AZR-ETH", Decimal::from(3));
        assert!(matches!(result, Err(LedgerError::InsufficientShares { .. })));

        let result = engine.remove_liquidity("alice", "AZR-ETH", Decimal::ZERO);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
    }

    #[test]
    fn test_closed_position_is_not_reused() {
        let (_, engine) = empty_engine();
        let receipt = engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(4), Decimal::from(1))
            .unwrap();
        engine
            .remove_liquidity("alice", "AZR-ETH", receipt.liquidity_shares)
            .unwrap();

        let result = engine.remove_liquidity("alice", "AZR-ETH", Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::PositionNotFound { .. })));
    }

    #[test]
    fn test_swap_scenario_a() {
        let (ledger, engine) = engine_with_pool(10000, 10);

        let receipt = engine.swap("alice", "AZR", "ETH", Decimal::from(100)).unwrap();

        let net = Decimal::new(997, 1);
        let expected = net * Decimal::from(10) / (Decimal::from(10000) + net);
        assert_eq!(receipt.amount_out, expected);
        // 99.7 * 10 / 10099.7
        assert_eq!(receipt.amount_out.round_dp(4), Decimal::new(987, 4));
        assert_eq!(receipt.fee, Decimal::new(3, 1));
        assert!(receipt.price_impact > Decimal::ZERO);

        let pool = pool(&ledger);
        assert_eq!(pool.reserve_a, Decimal::from(10100));
        assert_eq!(pool.reserve_b, Decimal::from(10) - expected);
        assert_eq!(ledger.swaps.len(), 1);
    }

    #[test]
    fn test_swap_reverse_orientation_updates_correct_side() {
        let (ledger, engine) = engine_with_pool(10000, 10);

        let receipt = engine.swap("alice", "ETH", "AZR", Decimal::ONE).unwrap();

        let pool = pool(&ledger);
        assert_eq!(pool.reserve_b, Decimal::from(11));
        assert_eq!(pool.reserve_a, Decimal::from(10000) - receipt.amount_out);
        assert!(receipt.amount_out < Decimal::from(1000));
    }

    #[test]
    fn test_swap_errors() {
        let (ledger, engine) = engine_with_pool(10000, 10);

        let result = engine.swap("alice", "AZR", "ETH", Decimal::ZERO);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));

        let result = engine.swap("alice", "AZR", "BTC", Decimal::ONE);
        assert!(matches!(result, Err(LedgerError::NoPoolForPair { .. })));

        assert!(ledger.swaps.is_empty());
    }

    #[test]
    fn test_swap_against_empty_side_is_insufficient_liquidity() {
        let (ledger, engine) = engine_with_pool(10000, 0);

        let result = engine.swap("alice", "AZR", "ETH", Decimal::from(100));

        assert!(matches!(result, Err(LedgerError::InsufficientLiquidity { .. })));
        assert_eq!(pool(&ledger).reserve_a, Decimal::from(10000));
    }

    #[test]
    fn test_quote_does_not_mutate() {
        let (ledger, engine) = engine_with_pool(10000, 10);

        let quote = engine.quote_swap("AZR", "ETH", Decimal::from(100)).unwrap();
        let receipt = engine.swap("alice", "AZR", "ETH", Decimal::from(100)).unwrap();

        assert_eq!(quote.amount_out, receipt.amount_out);
        assert_eq!(ledger.swaps.len(), 1);
    }

    #[test]
    fn test_position_value_uses_cross_rate() {
        let (ledger, engine) = empty_engine();
        engine
            .add_liquidity("alice", "AZR-ETH", "AZR", "ETH", Decimal::from(1000), Decimal::from(1))
            .unwrap();

        let views = engine.list_positions("alice").unwrap();
        assert_eq!(views.len(), 1);
        // 1000 AZR + 1 ETH * 1000
        assert_eq!(views[0].current_value.round_dp(8), Decimal::from(2000));

        let mut closed = views[0].position.clone();
        closed.is_active = false;
        assert_eq!(engine.position_value(&closed, &pool(&ledger)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_list_swaps_newest_first() {
        let (_, engine) = engine_with_pool(10000, 10000);
        let first = engine.swap("alice", "AZR", "ETH", Decimal::ONE).unwrap();
        let second = engine.swap("alice", "ETH", "AZR", Decimal::ONE).unwrap();
        engine.swap("bob", "AZR", "ETH", Decimal::ONE).unwrap();

        let swaps = engine.list_swaps("alice");
        assert_eq!(
            swaps.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![second.transaction_id, first.transaction_id]
        );
    }

    #[test]
    fn test_concurrent_swaps_conserve_reserves() {
        use std::thread;

        let (ledger, engine) = engine_with_pool(100000, 100000);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let owner = format!("trader-{}", i);
                    let mut received = Decimal::ZERO;
                    for _ in 0..25 {
                        received += engine
                            .swap(&owner, "AZR", "ETH", Decimal::from(10))
                            .unwrap()
                            .amount_out;
                    }
                    received
                })
            })
            .collect();

        let total_out: Decimal = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let pool = pool(&ledger);
        assert_eq!(pool.reserve_a, Decimal::from(100000 + 8 * 25 * 10));
        assert_eq!((pool.reserve_b + total_out).round_dp(10), Decimal::from(100000));
        assert_eq!(ledger.swaps.len(), 200);
        assert_eq!(engine.registry.list_active(PoolKind::Liquidity).len(), 1);
    }

    #[test]
    fn test_concurrent_add_and_remove_keep_shares_consistent() {
        use std::thread;

        let (ledger, engine) = empty_engine();
        engine
            .add_liquidity("seed", "AZR-ETH", "AZR", "ETH", Decimal::from(1000), Decimal::from(1000))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let owner = format!("provider-{}", i);
                    let amount = Decimal::from(10 + i);
                    for _ in 0..20 {
                        let added = engine
                            .add_liquidity(&owner, "AZR-ETH", "AZR", "ETH", amount, amount)
                            .unwrap();
                        engine
                            .remove_liquidity(&owner, "AZR-ETH", added.liquidity_shares)
                            .unwrap();
                    }
                    let kept = engine
                        .add_liquidity(&owner, "AZR-ETH", "AZR", "ETH", amount, amount)
                        .unwrap();
                    engine
                        .remove_liquidity(&owner, "AZR-ETH", kept.liquidity_shares / Decimal::TWO)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let pool = pool(&ledger);
        let active = ledger
            .liquidity_positions
            .find(|p| p.pool_id == "AZR-ETH" && p.is_active);
        let held: Decimal = active.iter().map(|p| p.liquidity_shares).sum();

        assert_eq!(active.len(), 9);
        assert!((pool.total_liquidity - held).abs() < Decimal::new(1, 12));
        assert!(pool.reserve_a > Decimal::ZERO);
        assert!(pool.reserve_b > Decimal::ZERO);
        assert!(ledger
            .liquidity_positions
            .find(|p| !p.is_active)
            .iter()
            .all(|p| p.liquidity_shares.is_zero()));
    }
}
