//! Synchronous processing strategy
//!
//! Replays a CSV file row by row on the calling thread.
//!
//! # Design
//!
//! The strategy only orchestrates, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Operation handling to `TokenEconomy`
//! - CSV output to `csv_format::write_pools_csv`
//!
//! Rows are streamed one at a time; memory grows with the number of
//! positions and records, not with the size of the file.

use crate::core::{EngineConfig, TokenEconomy};
use crate::io::csv_format::write_pools_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use token_economy_engine::core::EngineConfig;
/// use token_economy_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(EngineConfig::default());
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("operations.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    config: EngineConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let economy = TokenEconomy::new(self.config.clone());
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0usize;
        let mut rejected = 0usize;

        for result in reader {
            match result {
                Ok(operation) => {
                    let name = operation.name();
                    match economy.process(operation) {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(op = name, error = %e, "Operation rejected");
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "CSV parsing error");
                }
            }
        }

        info!(applied, rejected, "Replay finished");

        write_pools_csv(&economy.pools(), output)
    }
}
