//! Token economy facade
//!
//! This module provides the `TokenEconomy`, which wires the pool registry and
//! the three engines onto one shared `Ledger` and routes replayed
//! [`Operation`]s to them.
//!
//! The facade owns a `ManualClock`, so replayed time only moves on `advance`
//! rows. Request and escrow rows are addressed by caller-chosen labels, which
//! the facade maps to the record ids the ledger allocated.
//!
//! All methods take `&self`: the facade is shared behind an `Arc` by the
//! batch processor and every engine synchronizes through the ledger's record
//! locks.

use crate::core::clock::ManualClock;
use crate::core::liquidity::LiquidityEngine;
use crate::core::oracle::FixedRateOracle;
use crate::core::payments::{PaymentLedger, DEFAULT_FEE_RATE};
use crate::core::registry::PoolRegistry;
use crate::core::store::Ledger;
use crate::core::traits::Clock;
use crate::core::yield_engine::YieldEngine;
use crate::types::{LedgerError, Operation, Pool, RecordId};
use chrono::Duration;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

/// Partition shared by every payment, request and escrow row
pub const PAYMENTS_PARTITION: &str = "payments";

/// Settings for a `TokenEconomy`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fraction of each transfer charged as fee
    pub payment_fee_rate: Decimal,

    /// Value of one quote-token unit in base-token units, for position valuation
    pub cross_rate: Decimal,

    /// Owner of the seeded pool liquidity
    pub treasury: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payment_fee_rate: DEFAULT_FEE_RATE,
            cross_rate: Decimal::from(1000),
            treasury: "treasury".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a config, falling back to defaults for invalid values
    pub fn new(payment_fee_rate: Decimal, cross_rate: Decimal, treasury: impl Into<String>) -> Self {
        let default = Self::default();

        let payment_fee_rate = if payment_fee_rate < Decimal::ZERO || payment_fee_rate >= Decimal::ONE
        {
            warn!(
                "Invalid payment_fee_rate ({}), using default ({})",
                payment_fee_rate, default.payment_fee_rate
            );
            default.payment_fee_rate
        } else {
            payment_fee_rate
        };

        let cross_rate = if cross_rate <= Decimal::ZERO {
            warn!(
                "Invalid cross_rate ({}), using default ({})",
                cross_rate, default.cross_rate
            );
            default.cross_rate
        } else {
            cross_rate
        };

        let treasury = treasury.into();
        let treasury = if treasury.trim().is_empty() {
            warn!("Empty treasury owner, using default ({})", default.treasury);
            default.treasury
        } else {
            treasury
        };

        Self {
            payment_fee_rate,
            cross_rate,
            treasury,
        }
    }
}

/// Registry and engines over one shared ledger
pub struct TokenEconomy {
    ledger: Arc<Ledger>,
    clock: Arc<ManualClock>,
    registry: PoolRegistry,
    liquidity: LiquidityEngine,
    yields: YieldEngine,
    payments: PaymentLedger,
    request_labels: DashMap<String, RecordId>,
    escrow_labels: DashMap<String, RecordId>,
}

impl TokenEconomy {
    /// Create an economy with a freshly seeded ledger and a clock at the epoch
    pub fn new(config: EngineConfig) -> Self {
        let ledger = Arc::new(Ledger::new());
        let clock = Arc::new(ManualClock::at_epoch());
        let shared_clock: Arc<dyn Clock> = clock.clone();

        let registry = PoolRegistry::new(
            Arc::clone(&ledger),
            Arc::clone(&shared_clock),
            config.treasury,
        );
        registry.ensure_seeded();

        let liquidity = LiquidityEngine::new(
            Arc::clone(&ledger),
            registry.clone(),
            Arc::clone(&shared_clock),
            Arc::new(FixedRateOracle::new(config.cross_rate)),
        );
        let yields = YieldEngine::new(
            Arc::clone(&ledger),
            registry.clone(),
            Arc::clone(&shared_clock),
        );
        let payments = PaymentLedger::new(
            Arc::clone(&ledger),
            shared_clock,
            config.payment_fee_rate,
        );

        TokenEconomy {
            ledger,
            clock,
            registry,
            liquidity,
            yields,
            payments,
            request_labels: DashMap::new(),
            escrow_labels: DashMap::new(),
        }
    }

    /// Apply one operation
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged, or `InvalidOperation` for an
    /// unknown label or a negative `advance`.
    pub fn process(&self, operation: Operation) -> Result<(), LedgerError> {
        debug!(op = operation.name(), "Processing operation");

        match operation {
            Operation::AddLiquidity {
                owner,
                pool,
                token_a,
                token_b,
                amount_a,
                amount_b,
            } => self
                .liquidity
                .add_liquidity(&owner, &pool, &token_a, &token_b, amount_a, amount_b)
                .map(|_| ()),
            Operation::RemoveLiquidity {
                owner,
                pool,
                shares,
            } => self
                .liquidity
                .remove_liquidity(&owner, &pool, shares)
                .map(|_| ()),
            Operation::Swap {
                owner,
                from_token,
                to_token,
                amount_in,
            } => self
                .liquidity
                .swap(&owner, &from_token, &to_token, amount_in)
                .map(|_| ()),
            Operation::Deposit {
                owner,
                pool,
                amount,
            } => self.yields.deposit(&owner, &pool, amount).map(|_| ()),
            Operation::Withdraw {
                owner,
                pool,
                amount,
            } => self.yields.withdraw(&owner, &pool, amount).map(|_| ()),
            Operation::Send {
                sender,
                recipient,
                amount,
                description,
            } => self
                .payments
                .send_payment(&sender, &recipient, amount, description)
                .map(|_| ()),
            Operation::Request {
                requester,
                recipient,
                amount,
                label,
            } => {
                let request = self
                    .payments
                    .request_payment(&requester, &recipient, amount, &label)?;
                self.request_labels.insert(label, request.id);
                Ok(())
            }
            Operation::Fulfill { fulfiller, label } => {
                let request_id = self.lookup(&self.request_labels, "fulfill", &label)?;
                self.payments
                    .fulfill_payment_request(&fulfiller, request_id)
                    .map(|_| ())
            }
            Operation::Cancel { actor, label } => {
                let request_id = self.lookup(&self.request_labels, "cancel", &label)?;
                self.payments
                    .cancel_payment_request(&actor, request_id)
                    .map(|_| ())
            }
            Operation::Escrow {
                buyer,
                seller,
                amount,
                item,
            } => {
                let handle = self
                    .payments
                    .create_escrow_payment(&buyer, &seller, amount, &item)?;
                self.escrow_labels.insert(item, handle.escrow_id);
                Ok(())
            }
            Operation::Release { releaser, item } => {
                let escrow_id = self.lookup(&self.escrow_labels, "release", &item)?;
                self.payments
                    .release_escrow_payment(escrow_id, &releaser)
                    .map(|_| ())
            }
            Operation::Tick => {
                self.yields.distribute_tick();
                Ok(())
            }
            Operation::Advance { days } => {
                if days < 0 {
                    return Err(LedgerError::invalid_operation(
                        "advance",
                        format!("cannot move the clock back {} days", -days),
                    ));
                }
                let target = Duration::try_days(days)
                    .and_then(|step| self.clock.now().checked_add_signed(step))
                    .ok_or_else(|| {
                        LedgerError::invalid_operation(
                            "advance",
                            format!("{} days is out of range", days),
                        )
                    })?;
                self.clock.set(target);
                Ok(())
            }
        }
    }

    /// Key of the partition an operation belongs to, `None` for barriers
    ///
    /// Pool operations are keyed by the pool they mutate; a swap is keyed by
    /// the pool that would route it. Payment operations share one partition so
    /// labels resolve in row order.
    pub fn partition_key(&self, operation: &Operation) -> Option<String> {
        match operation {
            Operation::AddLiquidity { pool, .. }
            | Operation::RemoveLiquidity { pool, .. }
            | Operation::Deposit { pool, .. }
            | Operation::Withdraw { pool, .. } => Some(pool.clone()),
            Operation::Swap {
                from_token,
                to_token,
                ..
            } => Some(
                self.registry
                    .find_pair(from_token, to_token)
                    .map(|pool| pool.id)
                    .unwrap_or_else(|| format!("{}/{}", from_token, to_token)),
            ),
            Operation::Send { .. }
            | Operation::Request { .. }
            | Operation::Fulfill { .. }
            | Operation::Cancel { .. }
            | Operation::Escrow { .. }
            | Operation::Release { .. } => Some(PAYMENTS_PARTITION.to_string()),
            Operation::Tick | Operation::Advance { .. } => None,
        }
    }

    /// Every pool, sorted by id
    pub fn pools(&self) -> Vec<Pool> {
        self.registry.snapshot()
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn liquidity(&self) -> &LiquidityEngine {
        &self.liquidity
    }

    pub fn yields(&self) -> &YieldEngine {
        &self.yields
    }

    pub fn payments(&self) -> &PaymentLedger {
        &self.payments
    }

    fn lookup(
        &self,
        labels: &DashMap<String, RecordId>,
        op: &str,
        label: &str,
    ) -> Result<RecordId, LedgerError> {
        labels
            .get(label)
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::invalid_operation(op, format!("unknown label '{}'", label)))
    }
}

impl Default for TokenEconomy {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::RecordStore;
    use crate::types::{PaymentStatus, RequestStatus};
    use rstest::rstest;

    fn economy() -> TokenEconomy {
        TokenEconomy::default()
    }

    fn liquidity_pool(economy: &TokenEconomy, id: &str) -> crate::types::LiquidityPool {
        economy
            .registry()
            .get(id)
            .and_then(|p| p.as_liquidity().cloned())
            .unwrap()
    }

    #[test]
    fn test_new_economy_is_seeded() {
        let economy = economy();
        let pools = economy.pools();

        assert_eq!(pools.len(), 7);
        let ids: Vec<_> = pools.iter().map(|p| p.id().to_string()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[rstest]
    #[case::fee_too_high(Decimal::ONE, Decimal::from(5), "ops", DEFAULT_FEE_RATE, Decimal::from(5), "ops")]
    #[case::negative_fee(Decimal::new(-1, 2), Decimal::from(5), "ops", DEFAULT_FEE_RATE, Decimal::from(5), "ops")]
    #[case::zero_cross_rate(Decimal::ZERO, Decimal::ZERO, "ops", Decimal::ZERO, Decimal::from(1000), "ops")]
    #[case::blank_treasury(Decimal::new(2, 3), Decimal::ONE, "  ", Decimal::new(2, 3), Decimal::ONE, "treasury")]
    fn test_engine_config_falls_back_to_defaults(
        #[case] fee: Decimal,
        #[case] cross_rate: Decimal,
        #[case] treasury: &str,
        #[case] expected_fee: Decimal,
        #[case] expected_rate: Decimal,
        #[case] expected_treasury: &str,
    ) {
        let config = EngineConfig::new(fee, cross_rate, treasury);

        assert_eq!(config.payment_fee_rate, expected_fee);
        assert_eq!(config.cross_rate, expected_rate);
        assert_eq!(config.treasury, expected_treasury);
    }

    #[test]
    fn test_process_swap_routes_to_pool() {
        let economy = economy();

        economy
            .process(Operation::Swap {
                owner: "alice".to_string(),
                from_token: "AZR".to_string(),
                to_token: "ETH".to_string(),
                amount_in: Decimal::from(100),
            })
            .unwrap();

        let pool = liquidity_pool(&economy, "AZR-ETH");
        assert_eq!(pool.reserve_a, Decimal::from(10100));
        assert!(pool.reserve_b < Decimal::from(10));
    }

    #[test]
    fn test_process_request_labels() {
        let economy = economy();
        economy
            .process(Operation::Request {
                requester: "alice".to_string(),
                recipient: "bob".to_string(),
                amount: Decimal::from(12),
                label: "lunch".to_string(),
            })
            .unwrap();

        economy
            .process(Operation::Fulfill {
                fulfiller: "bob".to_string(),
                label: "lunch".to_string(),
            })
            .unwrap();

        let requests = economy.ledger().requests.find(|_| true);
        assert_eq!(requests[0].status, RequestStatus::Fulfilled);

        let unknown = economy.process(Operation::Fulfill {
            fulfiller: "bob".to_string(),
            label: "dinner".to_string(),
        });
        assert!(matches!(unknown, Err(LedgerError::InvalidOperation { .. })));
    }

    #[test]
    fn test_process_escrow_by_item() {
        let economy = economy();
        economy
            .process(Operation::Escrow {
                buyer: "A".to_string(),
                seller: "B".to_string(),
                amount: Decimal::from(500),
                item: "X".to_string(),
            })
            .unwrap();

        let third_party = economy.process(Operation::Release {
            releaser: "C".to_string(),
            item: "X".to_string(),
        });
        assert!(matches!(third_party, Err(LedgerError::Unauthorized { .. })));

        economy
            .process(Operation::Release {
                releaser: "A".to_string(),
                item: "X".to_string(),
            })
            .unwrap();
        let escrows = economy.ledger().payments.find(|tx| tx.is_escrow());
        assert_eq!(escrows[0].status, PaymentStatus::Completed);
    }

    #[test]
    fn test_advance_and_withdraw() {
        let economy = economy();
        let deposit = |amount: i64| Operation::Deposit {
            owner: "alice".to_string(),
            pool: "azr-staking".to_string(),
            amount: Decimal::from(amount),
        };
        economy.process(deposit(1000)).unwrap();
        economy.process(Operation::Advance { days: 365 }).unwrap();

        let receipt = economy
            .yields()
            .withdraw("alice", "azr-staking", Decimal::from(1000))
            .unwrap();
        assert_eq!(receipt.reward, Decimal::from(80));

        let back = economy.process(Operation::Advance { days: -1 });
        assert!(matches!(back, Err(LedgerError::InvalidOperation { .. })));

        let before = economy.clock().now();
        let far = economy.process(Operation::Advance { days: i64::MAX });
        assert!(matches!(far, Err(LedgerError::InvalidOperation { .. })));
        assert_eq!(economy.clock().now(), before);
    }

    #[rstest]
    #[case::swap_forward("AZR", "ETH", "AZR-ETH")]
    #[case::swap_reverse("USDC", "ETH", "ETH-USDC")]
    #[case::unroutable("AZR", "BTC", "AZR/BTC")]
    fn test_swap_partition_key(#[case] from: &str, #[case] to: &str, #[case] expected: &str) {
        let economy = economy();
        let op = Operation::Swap {
            owner: "alice".to_string(),
            from_token: from.to_string(),
            to_token: to.to_string(),
            amount_in: Decimal::ONE,
        };
        assert_eq!(economy.partition_key(&op).as_deref(), Some(expected));
    }

    #[test]
    fn test_barriers_have_no_partition() {
        let economy = economy();
        assert_eq!(economy.partition_key(&Operation::Tick), None);
        assert_eq!(economy.partition_key(&Operation::Advance { days: 1 }), None);
        assert_eq!(
            economy
                .partition_key(&Operation::Send {
                    sender: "a".to_string(),
                    recipient: "b".to_string(),
                    amount: Decimal::ONE,
                    description: None,
                })
                .as_deref(),
            Some(PAYMENTS_PARTITION)
        );
    }
}
