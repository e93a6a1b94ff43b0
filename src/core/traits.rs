//! Core traits for record storage, time and token valuation
//!
//! This module defines the capabilities the engines consume but do not own:
//! a record store with atomic per-record read-modify-write, a clock, and a
//! cross-rate source for valuing positions.

use crate::types::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::hash::Hash;

/// A record that can be kept in a [`RecordStore`]
pub trait Record: Clone + Send + Sync + 'static {
    /// Key the record is stored under
    type Key: Eq + Hash + Clone + Display + Send + Sync + 'static;

    /// The record's key
    fn key(&self) -> Self::Key;
}

/// Trait for storing and retrieving ledger records
///
/// Implementations must make `update` atomic for a single record: no other
/// caller may observe or modify the record while the closure runs.
pub trait RecordStore<R: Record>: Send + Sync {
    /// Insert a record, returning false if the key is already taken
    ///
    /// The first record stored under a key wins.
    fn insert(&self, record: R) -> bool;

    /// Get a snapshot of a record by key
    fn get(&self, key: &R::Key) -> Option<R>;

    /// Run a closure against a record while holding its lock
    ///
    /// Returns `None` if no record is stored under the key.
    fn update<T, F>(&self, key: &R::Key, f: F) -> Option<Result<T, LedgerError>>
    where
        F: FnOnce(&mut R) -> Result<T, LedgerError>;

    /// Snapshots of every record matching a predicate, in no guaranteed order
    fn find<P>(&self, predicate: P) -> Vec<R>
    where
        P: Fn(&R) -> bool;

    /// Visit every record mutably
    fn for_each_mut<F>(&self, f: F)
    where
        F: FnMut(&mut R);

    /// Number of records held
    fn len(&self) -> usize;

    /// Whether the store holds no records
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Cross-rate source used to express a pair's value in its base token
pub trait PriceOracle: Send + Sync {
    /// Value of one unit of `quote` expressed in `base`
    fn cross_rate(&self, base: &str, quote: &str) -> Decimal;
}
