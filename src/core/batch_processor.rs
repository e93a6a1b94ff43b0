//! Batch processing with pool-based partitioning
//!
//! This module provides the `BatchProcessor`, which runs a batch of replayed
//! operations concurrently while keeping the outcome identical to applying
//! them one by one.
//!
//! # Design
//!
//! A batch is first split at barrier operations (`tick`, `advance`), which
//! read or move state shared by every pool. Each run of operations between
//! barriers is partitioned by [`TokenEconomy::partition_key`]; partitions run
//! on their own tokio tasks, operations inside a partition run in row order,
//! and the barrier itself runs alone once every task of the run has finished.
//!
//! ```text
//! [op op op] TICK [op op] ADVANCE [op]
//!  \_______/       \___/           \_/
//!  partitioned     partitioned     partitioned
//! ```

use crate::core::engine::TokenEconomy;
use crate::types::{LedgerError, Operation};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Result of processing a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub operation: Operation,
    pub result: Result<(), LedgerError>,
}

/// A run of operations between barriers, or a barrier on its own
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Run(Vec<Operation>),
    Barrier(Operation),
}

/// Batch processor with pool-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    economy: Arc<TokenEconomy>,
}

impl BatchProcessor {
    pub fn new(economy: Arc<TokenEconomy>) -> Self {
        Self { economy }
    }

    /// Split a batch at barrier operations, preserving order
    ///
    /// Empty runs are not emitted.
    pub fn split_at_barriers(batch: Vec<Operation>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut run = Vec::new();

        for operation in batch {
            if operation.is_barrier() {
                if !run.is_empty() {
                    segments.push(Segment::Run(std::mem::take(&mut run)));
                }
                segments.push(Segment::Barrier(operation));
            } else {
                run.push(operation);
            }
        }
        if !run.is_empty() {
            segments.push(Segment::Run(run));
        }

        segments
    }

    /// Partition a run by the pool (or payments ledger) each operation touches
    ///
    /// Each operation lands in exactly one partition and keeps its relative
    /// order within it.
    pub fn partition_by_pool(&self, run: Vec<Operation>) -> HashMap<String, Vec<Operation>> {
        let mut partitions: HashMap<String, Vec<Operation>> = HashMap::new();

        for operation in run {
            match self.economy.partition_key(&operation) {
                Some(key) => partitions.entry(key).or_default().push(operation),
                None => warn!(op = operation.name(), "Barrier inside a run, dropping"),
            }
        }

        partitions
    }

    /// Process one partition's operations sequentially
    pub async fn process_partition(&self, operations: Vec<Operation>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());

        for operation in operations {
            let result = self.economy.process(operation.clone());
            results.push(ProcessingResult { operation, result });
        }

        results
    }

    /// Process a batch, running partitions between barriers concurrently
    ///
    /// Results of one run may come back in any order; runs and barriers are
    /// reported in batch order.
    pub async fn process_batch(&self, batch: Vec<Operation>) -> Vec<ProcessingResult> {
        let mut results = Vec::new();

        for segment in Self::split_at_barriers(batch) {
            match segment {
                Segment::Barrier(operation) => {
                    let result = self.economy.process(operation.clone());
                    results.push(ProcessingResult { operation, result });
                }
                Segment::Run(run) => {
                    let mut tasks = Vec::new();
                    for (_pool, operations) in self.partition_by_pool(run) {
                        let processor = self.clone();
                        tasks.push(tokio::spawn(async move {
                            processor.process_partition(operations).await
                        }));
                    }

                    for task in tasks {
                        match task.await {
                            Ok(partition_results) => results.extend(partition_results),
                            Err(e) => error!("Task panicked: {:?}", e),
                        }
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::RecordStore;
    use rust_decimal::Decimal;

    fn swap(owner: &str, from: &str, to: &str, amount: i64) -> Operation {
        Operation::Swap {
            owner: owner.to_string(),
            from_token: from.to_string(),
            to_token: to.to_string(),
            amount_in: Decimal::from(amount),
        }
    }

    fn deposit(owner: &str, pool: &str, amount: i64) -> Operation {
        Operation::Deposit {
            owner: owner.to_string(),
            pool: pool.to_string(),
            amount: Decimal::from(amount),
        }
    }

    #[test]
    fn test_split_at_barriers() {
        let batch = vec![
            deposit("alice", "azr-staking", 10),
            Operation::Tick,
            Operation::Tick,
            swap("bob", "AZR", "ETH", 1),
            Operation::Advance { days: 1 },
        ];

        let segments = BatchProcessor::split_at_barriers(batch);

        assert_eq!(
            segments,
            vec![
                Segment::Run(vec![deposit("alice", "azr-staking", 10)]),
                Segment::Barrier(Operation::Tick),
                Segment::Barrier(Operation::Tick),
                Segment::Run(vec![swap("bob", "AZR", "ETH", 1)]),
                Segment::Barrier(Operation::Advance { days: 1 }),
            ]
        );
    }

    #[test]
    fn test_partition_by_pool_keeps_order() {
        let processor = BatchProcessor::new(Arc::new(TokenEconomy::default()));
        let run = vec![
            swap("alice", "AZR", "ETH", 1),
            deposit("bob", "azr-staking", 5),
            swap("carol", "ETH", "AZR", 2),
        ];

        let partitions = processor.partition_by_pool(run);

        assert_eq!(partitions.len(), 2);
        assert_eq!(
            partitions["AZR-ETH"],
            vec![swap("alice", "AZR", "ETH", 1), swap("carol", "ETH", "AZR", 2)]
        );
        assert_eq!(partitions["azr-staking"], vec![deposit("bob", "azr-staking", 5)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_process_batch_matches_sequential_replay() {
        let batch = vec![
            swap("alice", "AZR", "ETH", 100),
            deposit("bob", "azr-staking", 1000),
            swap("carol", "USDC", "AZR", 50),
            Operation::Tick,
            swap("alice", "ETH", "AZR", 1),
            deposit("bob", "high-yield", 500),
            Operation::Advance { days: 30 },
            Operation::Withdraw {
                owner: "bob".to_string(),
                pool: "azr-staking".to_string(),
                amount: Decimal::from(1000),
            },
        ];

        let sequential = TokenEconomy::default();
        for operation in batch.clone() {
            sequential.process(operation).unwrap();
        }

        let concurrent = Arc::new(TokenEconomy::default());
        let results = BatchProcessor::new(Arc::clone(&concurrent))
            .process_batch(batch)
            .await;

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.result.is_ok()));
        assert_eq!(concurrent.pools(), sequential.pools());
        assert_eq!(
            concurrent.ledger().rewards.len(),
            sequential.ledger().rewards.len()
        );
    }

    #[tokio::test]
    async fn test_failed_operations_are_reported() {
        let processor = BatchProcessor::new(Arc::new(TokenEconomy::default()));

        let results = processor
            .process_batch(vec![swap("alice", "AZR", "BTC", 1), deposit("bob", "missing", 1)])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.result.is_err()));
    }
}
