//! Bounded mapping from query string to tracked entry.
//!
//! ## Key Components
//!
//! - `StmtTracker`: `RwLock<FxHashMap<String, Arc<StmtEntry>>>` with a hard
//!   entry bound. Readers during lookup and worker scans; the writer during
//!   bounded insert and batched pruning.
//!
//! ## Core Operations
//!
//! - `lookup`: read-locked fetch on the dispatch hot path.
//! - `insert_if_room`: write-locked bounded insert; re-checks under the lock
//!   so a concurrent insert of the same key returns the existing entry.
//! - `scan` / `read_guard`: read-locked iteration for the worker's candidate
//!   selection, decay, and prune collection. No I/O happens under the lock.
//! - `remove_cold`: write-locked batched deletion. The write lock is dropped
//!   and re-acquired between batches of 256 so concurrent lookups and
//!   inserts keep making progress during a large prune.
//!
//! ## Thread Safety
//!
//! `StmtTracker` is `Send + Sync`; entries are shared out as `Arc` clones so
//! scans never hold the lock while the worker talks to the database.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;

use crate::entry::StmtEntry;

/// Deletions applied per write-lock acquisition during pruning.
const REMOVE_BATCH: usize = 256;

#[derive(Debug)]
pub(crate) struct StmtTracker {
    map: RwLock<FxHashMap<String, Arc<StmtEntry>>>,
    capacity: usize,
}

impl StmtTracker {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
            capacity,
        }
    }

    /// Read-locked fetch.
    pub(crate) fn lookup(&self, query: &str) -> Option<Arc<StmtEntry>> {
        self.map.read().get(query).cloned()
    }

    /// Creates an entry for `query` if the tracker still has room.
    ///
    /// Returns the existing entry when the key was inserted concurrently,
    /// and `None` when the tracker is full — the dispatcher falls back to
    /// ad-hoc execution for untracked queries.
    pub(crate) fn insert_if_room(&self, query: &str) -> Option<Arc<StmtEntry>> {
        let mut map = self.map.write();
        if let Some(existing) = map.get(query) {
            return Some(Arc::clone(existing));
        }
        if map.len() >= self.capacity {
            return None;
        }
        let entry = Arc::new(StmtEntry::new(query));
        map.insert(query.to_string(), Arc::clone(&entry));
        Some(entry)
    }

    /// Current number of tracked entries.
    pub(crate) fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Maximum number of tracked entries.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read-locked single-pass iteration.
    pub(crate) fn scan<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<StmtEntry>),
    {
        let map = self.map.read();
        for entry in map.values() {
            f(entry);
        }
    }

    /// Read-locked view of the underlying map, for scans that also need the
    /// entry count or early exit. The caller must not perform I/O while the
    /// guard is live.
    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, FxHashMap<String, Arc<StmtEntry>>> {
        self.map.read()
    }

    /// Removes each named key if it is still present and still unprepared.
    ///
    /// Runs in batches of [`REMOVE_BATCH`] deletions, releasing the write
    /// lock between batches to bound the tail latency of concurrent
    /// dispatches.
    pub(crate) fn remove_cold(&self, keys: &[String]) {
        for chunk in keys.chunks(REMOVE_BATCH) {
            let mut map = self.map.write();
            for key in chunk {
                let still_cold = map.get(key).is_some_and(|entry| !entry.is_prepared());
                if still_cold {
                    map.remove(key);
                }
            }
        }
    }

    /// Write-locked teardown sweep: applies `f` to every entry, then drains
    /// the map. New dispatches observe an empty tracker afterwards.
    pub(crate) fn clear_with<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<StmtEntry>),
    {
        let mut map = self.map.write();
        for entry in map.values() {
            f(entry);
        }
        map.clear();
    }
}
