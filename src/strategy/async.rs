//! Asynchronous batch processing strategy
//!
//! Replays a CSV file in batches on a multi-threaded tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (barrier split + pool partitioning)
//!     └── TokenEconomy (shared behind Arc, DashMap-backed ledger)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed one after another
//! - Within a batch, `tick` and `advance` rows act as barriers
//! - Between barriers, each pool (and the payments ledger) is its own partition,
//!   replayed in row order on its own task
//!
//! Final pool states therefore match a sequential replay of the same file.

use crate::core::{BatchProcessor, EngineConfig, TokenEconomy};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_pools_csv;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values with defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size, default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                "Invalid max_concurrent_batches ({}), using default ({})",
                max_concurrent_batches, default.max_concurrent_batches
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    engine_config: EngineConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, engine_config: EngineConfig) -> Self {
        Self {
            config,
            engine_config,
        }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let economy = Arc::new(TokenEconomy::new(self.engine_config.clone()));
            let processor = BatchProcessor::new(Arc::clone(&economy));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads through the futures AsyncRead traits
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0usize;
            let mut rejected = 0usize;
            let mut batches = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                batches += 1;
                debug!(batch = batches, size = batch.len(), "Processing batch");

                // Wait for the whole batch before reading the next one
                for processed in processor.process_batch(batch).await {
                    match processed.result {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(op = processed.operation.name(), error = %e, "Operation rejected");
                        }
                    }
                }
            }

            info!(batches, applied, rejected, "Replay finished");

            write_pools_csv(&economy.pools(), output)
        })
    }
}
