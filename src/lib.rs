//! Token Economy Engine Library
//!
//! # Overview
//!
//! An in-memory engine for a small token economy: constant-product liquidity
//! pools, staking pools that accrue linear yield, and a payment ledger with
//! fee-bearing transfers, payment requests and escrow. A CSV replay driver
//! applies recorded operations with either a sync or an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (pools, positions, records, payments, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::store`] - DashMap-backed record stores shared by every engine
//!   - [`core::registry`] - Pool catalog and default seeding
//!   - [`core::liquidity`] - Add/remove liquidity and swaps
//!   - [`core::yield_engine`] - Staking deposits, withdrawals and distribution ticks
//!   - [`core::payments`] - Transfers, requests and escrow
//!   - [`core::engine`] - Replay facade over all of the above
//! - [`io`] - CSV reading and pool output
//! - [`strategy`] - Sync and async replay pipelines
//!
//! # Replay Operations
//!
//! - **add_liquidity / remove_liquidity / swap**: liquidity pools
//! - **deposit / withdraw**: yield pools
//! - **send / request / fulfill / cancel / escrow / release**: payments
//! - **tick**: hourly reward distribution
//! - **advance**: move the replay clock forward by whole days

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{EngineConfig, LiquidityEngine, PaymentLedger, PoolRegistry, TokenEconomy, YieldEngine};
pub use io::write_pools_csv;
pub use types::{LedgerError, Operation, Pool, PoolKind};
