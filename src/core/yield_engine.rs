//! Staking and DeFi deposit pools
//!
//! This module provides the `YieldEngine`, which accepts deposits into yield
//! pools, pays rewards on withdrawal and runs the periodic distribution sweep.
//!
//! # Reward accounting
//!
//! Each position keeps an accumulator (`accrued_reward`) that always equals
//! the sum of its reward records. Two things feed it:
//!
//! - `distribute_tick` credits `principal * apy / 8760` per active position
//!   and appends one record per credit.
//! - `withdraw` computes the linear entitlement
//!   `principal * apy * whole_days / 365` and pays the larger of that and the
//!   accumulator. Any shortfall is written as one settlement record, so a
//!   reward is never counted twice and records reconcile with the position
//!   when it closes.
//!
//! # Term stakes
//!
//! A term stake locks AZR for 30 to 365 days at a rate fixed by its duration
//! tier. `distribute_daily` credits one day of reward per active stake, and
//! `unstake` settles the term entitlement the same way `withdraw` does, with
//! days counted up to the end of the term. Stakes of 90 days or more then sit
//! in a 7-day unbonding period that `process_unbonding` clears.

use crate::core::amm::{add, div, mul};
use crate::core::registry::PoolRegistry;
use crate::core::store::Ledger;
use crate::core::traits::{Clock, RecordStore};
use crate::types::{
    LedgerError, Pool, RecordId, RewardCategory, RewardKind, RewardRecord, StakeStatus, TermStake,
    YieldPosition,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DAYS_PER_YEAR: i64 = 365;
const HOURS_PER_YEAR: i64 = DAYS_PER_YEAR * 24;

/// Shortest and longest term a stake may lock for
pub const MIN_TERM_DAYS: i64 = 30;
pub const MAX_TERM_DAYS: i64 = 365;

/// Terms at least this long unbond instead of paying out at once
pub const UNBONDING_FROM_DAYS: i64 = 90;
pub const UNBONDING_DAYS: i64 = 7;

/// Pool id written on term stake reward records
pub const TERM_STAKING_POOL: &str = "azr-term-staking";

const MIN_STAKE: Decimal = Decimal::ONE;

/// Result of a successful `withdraw`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawReceipt {
    /// Position closed by the withdrawal
    pub position_id: RecordId,
    pub withdrawn_amount: Decimal,
    pub reward: Decimal,
    pub total_returned: Decimal,

    /// Fresh position holding the principal left behind, if any
    pub reopened_position: Option<RecordId>,
}

/// A yield position with its reward as of now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldPositionView {
    pub position: YieldPosition,

    /// Live reward for active positions, the paid reward for closed ones
    pub current_reward: Decimal,
}

/// Outcome of one distribution sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionSummary {
    /// Positions credited
    pub positions: usize,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardHistory {
    /// Newest first
    pub records: Vec<RewardRecord>,

    /// Lifetime total across every record of the owner
    pub total: Decimal,
}

/// Aggregates over active yield positions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YieldPoolStats {
    pub total_staked: Decimal,
    pub active_positions: usize,
    pub stakers: usize,

    /// Mean pool APY across active positions
    pub average_apy: Decimal,
}

/// Result of a successful `create_stake`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeReceipt {
    pub stake_id: RecordId,
    pub amount: Decimal,
    pub duration_days: i64,
    pub apy: Decimal,
    pub ends_at: DateTime<Utc>,

    /// Linear reward for the full term
    pub estimated_reward: Decimal,
}

/// Result of a successful `unstake`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnstakeReceipt {
    pub stake_id: RecordId,
    pub status: StakeStatus,
    pub reward: Decimal,

    /// End of the unbonding period, for stakes that unbond
    pub available_at: Option<DateTime<Utc>>,

    /// Principal plus reward, for stakes that complete at once
    pub returned_amount: Option<Decimal>,
}

/// Annual rate for a term of `days` days
pub fn term_apy(days: i64) -> Decimal {
    match days {
        d if d >= 365 => Decimal::new(12, 2),
        d if d >= 180 => Decimal::new(8, 2),
        d if d >= 90 => Decimal::new(6, 2),
        d if d >= 30 => Decimal::new(4, 2),
        _ => Decimal::new(2, 2),
    }
}

/// Linear reward for `days` whole days at an annual rate
///
/// Multiplies before dividing so whole-year periods come out exact.
pub fn linear_reward(principal: Decimal, apy: Decimal, days: i64) -> Result<Decimal, LedgerError> {
    if days <= 0 {
        return Ok(Decimal::ZERO);
    }
    let gross = mul(mul(principal, apy, "reward")?, Decimal::from(days), "reward")?;
    div(gross, Decimal::from(DAYS_PER_YEAR), "reward")
}

/// One hour's worth of reward at an annual rate
pub fn hourly_reward(principal: Decimal, apy: Decimal) -> Result<Decimal, LedgerError> {
    div(
        mul(principal, apy, "distribute_tick")?,
        Decimal::from(HOURS_PER_YEAR),
        "distribute_tick",
    )
}

fn whole_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days().max(0)
}

/// Staking and DeFi deposit engine
#[derive(Clone)]
pub struct YieldEngine {
    ledger: Arc<Ledger>,
    registry: PoolRegistry,
    clock: Arc<dyn Clock>,
}

impl YieldEngine {
    pub fn new(ledger: Arc<Ledger>, registry: PoolRegistry, clock: Arc<dyn Clock>) -> Self {
        YieldEngine {
            ledger,
            registry,
            clock,
        }
    }

    /// Open a position in an active yield pool
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is zero or negative
    /// - `PoolNotFound` if the pool is missing, inactive or a liquidity pool
    pub fn deposit(
        &self,
        owner: &str,
        pool_id: &str,
        amount: Decimal,
    ) -> Result<YieldPosition, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("deposit", amount));
        }

        let now = self.clock.now();
        let position = self
            .ledger
            .pools
            .update(&pool_id.to_string(), |pool| {
                let pool = match pool {
                    Pool::Yield(p) if p.is_active => p,
                    _ => return Err(LedgerError::pool_not_found(pool_id)),
                };

                let total_deposits = add(pool.total_deposits, amount, "deposit")?;
                let position =
                    YieldPosition::open(self.ledger.next_id(), owner, pool_id, amount, now);

                pool.total_deposits = total_deposits;
                self.ledger.yield_positions.insert(position.clone());
                Ok(position)
            })
            .unwrap_or_else(|| Err(LedgerError::pool_not_found(pool_id)))?;

        info!(owner, pool = pool_id, position = position.id, amount = %amount, "Deposit accepted");
        Ok(position)
    }

    /// Withdraw principal from the owner's oldest active position in the pool
    ///
    /// The position is closed and paid its reward; principal left behind is
    /// re-opened as a fresh position starting now. Withdrawal from a
    /// deactivated pool is allowed.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is zero or negative
    /// - `PositionNotFound` if the owner has no active position in the pool
    /// - `InsufficientPrincipal` if `amount` exceeds the position's principal
    pub fn withdraw(
        &self,
        owner: &str,
        pool_id: &str,
        amount: Decimal,
    ) -> Result<WithdrawReceipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("withdraw", amount));
        }

        let now = self.clock.now();
        let receipt = self
            .ledger
            .pools
            .update(&pool_id.to_string(), |pool| {
                let pool = match pool {
                    Pool::Yield(p) => p,
                    Pool::Liquidity(_) => {
                        return Err(LedgerError::position_not_found(owner, pool_id))
                    }
                };

                let position_id = self
                    .oldest_active_position(owner, pool_id)
                    .map(|p| p.id)
                    .ok_or_else(|| LedgerError::position_not_found(owner, pool_id))?;

                let apy = pool.apy;
                let (principal, reward, shortfall) = self
                    .ledger
                    .yield_positions
                    .update(&position_id, |position| {
                        if !position.is_active {
                            return Err(LedgerError::position_not_found(owner, pool_id));
                        }
                        if amount > position.principal {
                            return Err(LedgerError::insufficient_principal(
                                owner,
                                position.principal,
                                amount,
                            ));
                        }

                        let days = whole_days(position.opened_at, now);
                        let entitlement = linear_reward(position.principal, apy, days)?;
                        let reward = entitlement.max(position.accrued_reward);
                        let shortfall = reward - position.accrued_reward;

                        position.accrued_reward = reward;
                        position.is_active = false;
                        position.closed_at = Some(now);
                        Ok((position.principal, reward, shortfall))
                    })
                    .unwrap_or_else(|| Err(LedgerError::position_not_found(owner, pool_id)))?;

                if shortfall > Decimal::ZERO {
                    self.ledger.rewards.insert(RewardRecord {
                        id: self.ledger.next_id(),
                        owner: owner.to_string(),
                        position_id,
                        pool_id: pool_id.to_string(),
                        amount: shortfall,
                        category: RewardCategory::for_pool_name(&pool.name),
                        kind: RewardKind::Maturity,
                        rewarded_at: now,
                    });
                }

                let remaining = principal - amount;
                let reopened_position = if remaining > Decimal::ZERO {
                    let position =
                        YieldPosition::open(self.ledger.next_id(), owner, pool_id, remaining, now);
                    let id = position.id;
                    self.ledger.yield_positions.insert(position);
                    Some(id)
                } else {
                    None
                };

                pool.total_deposits = (pool.total_deposits - amount).max(Decimal::ZERO);

                Ok(WithdrawReceipt {
                    position_id,
                    withdrawn_amount: amount,
                    reward,
                    total_returned: add(amount, reward, "withdraw")?,
                    reopened_position,
                })
            })
            .unwrap_or_else(|| Err(LedgerError::position_not_found(owner, pool_id)))?;

        info!(
            owner,
            pool = pool_id,
            position = receipt.position_id,
            amount = %amount,
            reward = %receipt.reward,
            "Withdrawal paid"
        );
        Ok(receipt)
    }

    /// Every yield position of an owner, oldest first
    pub fn list_positions(&self, owner: &str) -> Result<Vec<YieldPositionView>, LedgerError> {
        let now = self.clock.now();
        let mut positions = self.ledger.yield_positions.find(|p| p.owner == owner);
        positions.sort_by_key(|p| p.id);

        positions
            .into_iter()
            .map(|position| {
                let current_reward = if position.is_active {
                    let apy = self.pool_apy(&position.pool_id);
                    let days = whole_days(position.opened_at, now);
                    linear_reward(position.principal, apy, days)?.max(position.accrued_reward)
                } else {
                    position.accrued_reward
                };
                Ok(YieldPositionView {
                    position,
                    current_reward,
                })
            })
            .collect()
    }

    /// Credit one hour of reward to every active position
    ///
    /// Pool parameters are read once up front; the sweep then visits
    /// positions without touching the pool store.
    pub fn distribute_tick(&self) -> DistributionSummary {
        let now = self.clock.now();
        let rates: HashMap<String, (Decimal, RewardCategory)> = self
            .ledger
            .pools
            .find(|pool| pool.as_yield().is_some())
            .into_iter()
            .filter_map(|pool| match pool {
                Pool::Yield(p) => Some((p.id, (p.apy, RewardCategory::for_pool_name(&p.name)))),
                Pool::Liquidity(_) => None,
            })
            .collect();

        let mut summary = DistributionSummary::default();
        self.ledger.yield_positions.for_each_mut(|position| {
            if !position.is_active {
                return;
            }
            let Some((apy, category)) = rates.get(&position.pool_id) else {
                return;
            };

            let credited = hourly_reward(position.principal, *apy).and_then(|hourly| {
                let accrued = add(position.accrued_reward, hourly, "distribute_tick")?;
                Ok((hourly, accrued))
            });
            let (hourly, accrued) = match credited {
                Ok(credit) => credit,
                Err(e) => {
                    warn!(position = position.id, error = %e, "Skipping reward credit");
                    return;
                }
            };
            if hourly <= Decimal::ZERO {
                return;
            }

            position.accrued_reward = accrued;
            self.ledger.rewards.insert(RewardRecord {
                id: self.ledger.next_id(),
                owner: position.owner.clone(),
                position_id: position.id,
                pool_id: position.pool_id.clone(),
                amount: hourly,
                category: *category,
                kind: RewardKind::Hourly,
                rewarded_at: now,
            });

            summary.positions += 1;
            summary.total = summary.total.saturating_add(hourly);
        });

        info!(positions = summary.positions, total = %summary.total, "Rewards distributed");
        summary
    }

    /// Reward records of an owner, newest first, with the lifetime total
    pub fn reward_history(&self, owner: &str, limit: Option<usize>) -> RewardHistory {
        let mut records = self.ledger.rewards.find(|r| r.owner == owner);
        records.sort_by(|a, b| b.id.cmp(&a.id));

        let total = records
            .iter()
            .fold(Decimal::ZERO, |sum, r| sum.saturating_add(r.amount));
        if let Some(limit) = limit {
            records.truncate(limit);
        }

        RewardHistory { records, total }
    }

    pub fn pool_stats(&self) -> YieldPoolStats {
        let active = self.ledger.yield_positions.find(|p| p.is_active);
        if active.is_empty() {
            return YieldPoolStats::default();
        }

        let total_staked = active
            .iter()
            .fold(Decimal::ZERO, |sum, p| sum.saturating_add(p.principal));
        let stakers = active.iter().map(|p| p.owner.as_str()).collect::<HashSet<_>>().len();
        let apy_sum = active
            .iter()
            .fold(Decimal::ZERO, |sum, p| sum.saturating_add(self.pool_apy(&p.pool_id)));

        YieldPoolStats {
            total_staked,
            active_positions: active.len(),
            stakers,
            average_apy: apy_sum / Decimal::from(active.len()),
        }
    }

    /// Projected linear reward for depositing `amount` for `days` days
    pub fn estimate_reward(
        &self,
        pool_id: &str,
        amount: Decimal,
        days: i64,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("estimate_reward", amount));
        }
        if days < 0 {
            return Err(LedgerError::invalid_amount("estimate_reward", Decimal::from(days)));
        }

        let apy = match self.registry.get(pool_id) {
            Some(Pool::Yield(pool)) if pool.is_active => pool.apy,
            _ => return Err(LedgerError::pool_not_found(pool_id)),
        };
        let estimate = linear_reward(amount, apy, days)?;
        debug!(pool = pool_id, amount = %amount, days, estimate = %estimate, "Reward estimated");
        Ok(estimate)
    }

    /// Lock `amount` AZR for `duration_days` days at the duration's tier rate
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is zero or negative
    /// - `BelowMinimum` if `amount` is under 1 AZR
    /// - `InvalidDuration` if the term is outside 30..=365 days
    pub fn create_stake(
        &self,
        owner: &str,
        amount: Decimal,
        duration_days: i64,
    ) -> Result<StakeReceipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("create_stake", amount));
        }
        if amount < MIN_STAKE {
            return Err(LedgerError::below_minimum("create_stake", amount, MIN_STAKE));
        }
        if !(MIN_TERM_DAYS..=MAX_TERM_DAYS).contains(&duration_days) {
            return Err(LedgerError::invalid_duration(
                duration_days,
                MIN_TERM_DAYS,
                MAX_TERM_DAYS,
            ));
        }

        let now = self.clock.now();
        let ends_at = now
            .checked_add_signed(Duration::days(duration_days))
            .ok_or_else(|| LedgerError::arithmetic_overflow("create_stake"))?;
        let apy = term_apy(duration_days);
        let estimated_reward = linear_reward(amount, apy, duration_days)?;

        let stake = TermStake {
            id: self.ledger.next_id(),
            owner: owner.to_string(),
            amount,
            duration_days,
            apy,
            opened_at: now,
            ends_at,
            accrued_reward: Decimal::ZERO,
            status: StakeStatus::Active,
            unstake_requested_at: None,
            unbonding_until: None,
            completed_at: None,
        };
        let stake_id = stake.id;
        self.ledger.term_stakes.insert(stake);

        info!(owner, stake = stake_id, amount = %amount, days = duration_days, apy = %apy, "Stake created");
        Ok(StakeReceipt {
            stake_id,
            amount,
            duration_days,
            apy,
            ends_at,
            estimated_reward,
        })
    }

    /// End an active stake and settle its reward
    ///
    /// Days are counted up to the end of the term. Stakes of 90 days or
    /// more move to `Unstaking` for 7 days; shorter ones complete at once.
    ///
    /// # Errors
    ///
    /// - `StakeNotFound` if the owner holds no stake with this id
    /// - `AlreadyProcessed` if the stake is unstaking or completed
    pub fn unstake(&self, owner: &str, stake_id: RecordId) -> Result<UnstakeReceipt, LedgerError> {
        let now = self.clock.now();
        let receipt = self
            .ledger
            .term_stakes
            .update(&stake_id, |stake| {
                if stake.owner != owner {
                    return Err(LedgerError::stake_not_found(stake_id, owner));
                }
                if stake.status != StakeStatus::Active {
                    return Err(LedgerError::already_processed("Term stake", stake_id, stake.status));
                }

                let days = whole_days(stake.opened_at, now).min(stake.duration_days);
                let entitlement = linear_reward(stake.amount, stake.apy, days)?;
                let reward = entitlement.max(stake.accrued_reward);
                let shortfall = reward - stake.accrued_reward;

                let receipt = if stake.duration_days >= UNBONDING_FROM_DAYS {
                    let until = now
                        .checked_add_signed(Duration::days(UNBONDING_DAYS))
                        .ok_or_else(|| LedgerError::arithmetic_overflow("unstake"))?;
                    stake.status = StakeStatus::Unstaking;
                    stake.unbonding_until = Some(until);
                    UnstakeReceipt {
                        stake_id,
                        status: StakeStatus::Unstaking,
                        reward,
                        available_at: Some(until),
                        returned_amount: None,
                    }
                } else {
                    let returned = add(stake.amount, reward, "unstake")?;
                    stake.status = StakeStatus::Completed;
                    stake.completed_at = Some(now);
                    UnstakeReceipt {
                        stake_id,
                        status: StakeStatus::Completed,
                        reward,
                        available_at: None,
                        returned_amount: Some(returned),
                    }
                };
                stake.unstake_requested_at = Some(now);
                stake.accrued_reward = reward;

                if shortfall > Decimal::ZERO {
                    self.ledger.rewards.insert(RewardRecord {
                        id: self.ledger.next_id(),
                        owner: owner.to_string(),
                        position_id: stake_id,
                        pool_id: TERM_STAKING_POOL.to_string(),
                        amount: shortfall,
                        category: RewardCategory::Staking,
                        kind: RewardKind::Maturity,
                        rewarded_at: now,
                    });
                }
                Ok(receipt)
            })
            .unwrap_or_else(|| Err(LedgerError::stake_not_found(stake_id, owner)))?;

        info!(owner, stake = stake_id, status = %receipt.status, reward = %receipt.reward, "Unstake accepted");
        Ok(receipt)
    }

    /// Credit one day of reward to every active stake still inside its term
    pub fn distribute_daily(&self) -> DistributionSummary {
        let now = self.clock.now();
        let mut summary = DistributionSummary::default();

        self.ledger.term_stakes.for_each_mut(|stake| {
            if stake.status != StakeStatus::Active || now >= stake.ends_at {
                return;
            }

            let credited = linear_reward(stake.amount, stake.apy, 1).and_then(|daily| {
                let accrued = add(stake.accrued_reward, daily, "distribute_daily")?;
                Ok((daily, accrued))
            });
            let (daily, accrued) = match credited {
                Ok(credit) => credit,
                Err(e) => {
                    warn!(stake = stake.id, error = %e, "Skipping daily reward");
                    return;
                }
            };

            stake.accrued_reward = accrued;
            self.ledger.rewards.insert(RewardRecord {
                id: self.ledger.next_id(),
                owner: stake.owner.clone(),
                position_id: stake.id,
                pool_id: TERM_STAKING_POOL.to_string(),
                amount: daily,
                category: RewardCategory::Staking,
                kind: RewardKind::Daily,
                rewarded_at: now,
            });

            summary.positions += 1;
            summary.total = summary.total.saturating_add(daily);
        });

        info!(stakes = summary.positions, total = %summary.total, "Daily stake rewards distributed");
        summary
    }

    /// Complete every stake whose unbonding period has ended
    ///
    /// Returns the number of stakes completed.
    pub fn process_unbonding(&self) -> usize {
        let now = self.clock.now();
        let mut completed = 0;

        self.ledger.term_stakes.for_each_mut(|stake| {
            let matured = stake.unbonding_until.is_some_and(|until| until <= now);
            if stake.status == StakeStatus::Unstaking && matured {
                stake.status = StakeStatus::Completed;
                stake.completed_at = Some(now);
                completed += 1;
            }
        });

        if completed > 0 {
            info!(completed, "Unbonding stakes released");
        }
        completed
    }

    /// Term stakes of an owner, newest first
    pub fn list_stakes(&self, owner: &str) -> Vec<TermStake> {
        let mut stakes = self.ledger.term_stakes.find(|s| s.owner == owner);
        stakes.sort_by(|a, b| b.id.cmp(&a.id));
        stakes
    }

    fn pool_apy(&self, pool_id: &str) -> Decimal {
        match self.registry.get(pool_id) {
            Some(Pool::Yield(pool)) => pool.apy,
            _ => Decimal::ZERO,
        }
    }

    fn oldest_active_position(&self, owner: &str, pool_id: &str) -> Option<YieldPosition> {
        self.ledger
            .yield_positions
            .find(|p| p.owner == owner && p.pool_id == pool_id && p.is_active)
            .into_iter()
            .min_by_key(|p| p.id)
    }
}
