//! In-memory record store
//!
//! This module provides `MemoryStore`, a thread-safe [`RecordStore`] backed by
//! `DashMap`, and the `Ledger` that bundles one store per record kind together
//! with the id allocator.
//!
//! # Thread Safety
//!
//! `DashMap` shards its entries behind fine-grained locks, so operations on
//! different records proceed in parallel while operations on the same record
//! are serialized. `update` holds the entry's write lock for the duration of
//! the closure, which is what gives the engines atomic read-modify-write per
//! pool.
//!
//! # Lock Order
//!
//! A closure running under a pool lock may lock positions and append records,
//! never the other way around. Code holding a position lock must not touch the
//! pool store.

use crate::core::traits::{Record, RecordStore};
use crate::types::{
    LedgerError, LiquidityPosition, PaymentRequest, PaymentTransaction, Pool, RecordId,
    RewardRecord, SwapTransaction, TermStake, YieldPosition,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe record store backed by `DashMap`
#[derive(Debug)]
pub struct MemoryStore<R: Record> {
    records: DashMap<R::Key, R>,
}

impl<R: Record> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> RecordStore<R> for MemoryStore<R> {
    fn insert(&self, record: R) -> bool {
        let mut inserted = false;
        self.records.entry(record.key()).or_insert_with(|| {
            inserted = true;
            record
        });
        inserted
    }

    fn get(&self, key: &R::Key) -> Option<R> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    fn update<T, F>(&self, key: &R::Key, f: F) -> Option<Result<T, LedgerError>>
    where
        F: FnOnce(&mut R) -> Result<T, LedgerError>,
    {
        self.records
            .get_mut(key)
            .map(|mut entry| f(entry.value_mut()))
    }

    fn find<P>(&self, predicate: P) -> Vec<R>
    where
        P: Fn(&R) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn for_each_mut<F>(&self, mut f: F)
    where
        F: FnMut(&mut R),
    {
        for mut entry in self.records.iter_mut() {
            f(entry.value_mut());
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

impl Record for Pool {
    type Key = String;

    fn key(&self) -> String {
        self.id().to_string()
    }
}

macro_rules! record_keyed_by_id {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                type Key = RecordId;

                fn key(&self) -> RecordId {
                    self.id
                }
            }
        )*
    };
}

record_keyed_by_id!(
    LiquidityPosition,
    YieldPosition,
    TermStake,
    RewardRecord,
    SwapTransaction,
    PaymentTransaction,
    PaymentRequest,
);

/// All records of one ledger
///
/// Shared between the engines behind an `Arc`. Record ids are unique across
/// every store of the ledger and strictly increasing in allocation order.
#[derive(Debug)]
pub struct Ledger {
    pub pools: MemoryStore<Pool>,
    pub liquidity_positions: MemoryStore<LiquidityPosition>,
    pub yield_positions: MemoryStore<YieldPosition>,
    pub term_stakes: MemoryStore<TermStake>,
    pub rewards: MemoryStore<RewardRecord>,
    pub swaps: MemoryStore<SwapTransaction>,
    pub payments: MemoryStore<PaymentTransaction>,
    pub requests: MemoryStore<PaymentRequest>,
    next_id: AtomicU64,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            pools: MemoryStore::new(),
            liquidity_positions: MemoryStore::new(),
            yield_positions: MemoryStore::new(),
            term_stakes: MemoryStore::new(),
            rewards: MemoryStore::new(),
            swaps: MemoryStore::new(),
            payments: MemoryStore::new(),
            requests: MemoryStore::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate the next record id
    pub fn next_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
