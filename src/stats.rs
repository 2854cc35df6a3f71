use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of the cache's monotone counters.
///
/// All five counters only ever grow over a cache's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StmtCacheStats {
    /// Prepared statements created (Prepare calls issued).
    pub prepared: u64,
    /// Prepared statements retired (Close calls issued).
    pub unprepared: u64,
    /// Calls that ran through a prepared statement.
    pub hits: u64,
    /// Calls that fell back to ad-hoc execution.
    pub misses: u64,
    /// Calls rejected for caching (query too long).
    pub skips: u64,
}

/// Live counters behind [`StmtCacheStats`]; shared across dispatch threads
/// and the background worker.
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    prepared: AtomicU64,
    unprepared: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    skips: AtomicU64,
}

impl StatCounters {
    pub(crate) fn snapshot(&self) -> StmtCacheStats {
        StmtCacheStats {
            prepared: self.prepared.load(Ordering::Relaxed),
            unprepared: self.unprepared.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            skips: self.skips.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc_prepared(&self) {
        self.prepared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_unprepared(&self) {
        self.unprepared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_skips(&self) {
        self.skips.fetch_add(1, Ordering::Relaxed);
    }
}
