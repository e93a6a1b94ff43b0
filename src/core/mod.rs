//! Core business logic module
//!
//! This module contains the token economy components:
//! - `traits` - Record store, clock and price oracle abstractions
//! - `store` - DashMap-backed record store and the shared `Ledger`
//! - `amm` - Constant-product pricing math
//! - `registry` - Pool catalog and default seeding
//! - `liquidity` - Liquidity provision and swaps
//! - `yield_engine` - Staking deposits, term stakes and reward distribution
//! - `payments` - Transfers, payment requests and escrow
//! - `engine` - Facade routing replayed operations to the engines
//! - `batch_processor` - Concurrent replay with pool-based partitioning

pub mod amm;
pub mod batch_processor;
pub mod clock;
pub mod engine;
pub mod liquidity;
pub mod oracle;
pub mod payments;
pub mod registry;
pub mod store;
pub mod traits;
pub mod yield_engine;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use clock::{ManualClock, SystemClock};
pub use engine::{EngineConfig, TokenEconomy};
pub use liquidity::LiquidityEngine;
pub use oracle::FixedRateOracle;
pub use payments::PaymentLedger;
pub use registry::PoolRegistry;
pub use store::{Ledger, MemoryStore};
pub use traits::{Clock, PriceOracle, RecordStore};
pub use yield_engine::YieldEngine;
