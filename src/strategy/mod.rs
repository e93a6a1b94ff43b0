//! Processing strategy module for operation replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! covering both CSV parsing and engine processing. Different implementations
//! (synchronous, asynchronous batch) can be selected at runtime and must
//! produce the same final pool states for the same input.

use crate::cli::StrategyType;
use crate::core::EngineConfig;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete replay pipelines
///
/// Each strategy reads operations from a CSV file, applies them to a fresh
/// `TokenEconomy` and writes the final pool states to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay operations from `input_path` and write pool states to `output`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The async runtime cannot be started
    /// - Output cannot be written
    ///
    /// Rows that fail to parse or whose operation is rejected are logged and
    /// skipped; they never abort the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// `batch_config` is ignored by the sync strategy.
pub fn create_strategy(
    strategy_type: StrategyType,
    batch_config: Option<BatchConfig>,
    engine_config: EngineConfig,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine_config)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            batch_config.unwrap_or_default(),
            engine_config,
        )),
    }
}
