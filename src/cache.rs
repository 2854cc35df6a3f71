//! The statement cache façade and its dispatch entry points.
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► execute / query / query_row (pooled or _tx)
//!                │
//!                ▼
//!           route(query)
//!                │  lookup (+ bounded insert) in StmtTracker
//!                │  global tick → maybe spawn promoter thread
//!                │  record_hit, acquire handle
//!                ▼
//!        ┌── handle? ──┐
//!        ▼             ▼
//!   prepared stmt   ad-hoc client/tx call
//!   (hits += 1)     (misses += 1)
//! ```
//!
//! ## Key Concepts
//!
//! - **Transparency**: the six dispatch operations mirror the underlying
//!   client's surface; callers switch to the cache without changing call
//!   sites. Results and errors pass through unchanged.
//! - **Single-flight worker**: every dispatch ticks a global counter; the
//!   dispatch that crosses the threshold spawns the promotion worker,
//!   guarded by an atomic flag so at most one worker runs at a time.
//! - **Teardown**: idempotent; retires every prepared statement and drains
//!   the tracker. A torn-down cache degrades to ad-hoc dispatch against the
//!   still-open client. Dropping the cache tears it down as a safety net.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stmtkit::cache::StmtCache;
//! use stmtkit::client::{Deadline, Value};
//!
//! let cache = StmtCache::new(Arc::new(my_driver));
//! let rows = cache.query(
//!     &Deadline::none(),
//!     "SELECT a, b FROM t WHERE a = ?",
//!     &[Value::Integer(7)],
//! )?;
//! println!("{:?}", cache.stats());
//! cache.teardown();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use crate::builder::StmtCacheBuilder;
use crate::client::{DbClient, DbError, DbTransaction, Deadline, ExecOutcome, Row, Rows, Value};
use crate::entry::StmtHandle;
use crate::promoter;
use crate::stats::{StatCounters, StmtCacheStats};
use crate::tracker::StmtTracker;

/// Validated configuration, immutable after construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Config {
    pub(crate) max_prepared_stmts: u32,
    pub(crate) max_tracked_stmts: usize,
    pub(crate) max_query_len: usize,
    pub(crate) promote_threshold: u32,
}

/// Shared cache state: owned jointly by the façade and any running worker
/// thread.
pub(crate) struct CacheCore {
    pub(crate) tracker: StmtTracker,
    pub(crate) client: Arc<dyn DbClient>,
    pub(crate) cfg: Config,
    /// Entries currently holding a prepared statement.
    pub(crate) prepared_count: AtomicU32,
    pub(crate) stats: StatCounters,
    /// Dispatches since the last worker launch.
    ticks: AtomicU32,
    /// Single-flight guard for the worker.
    worker_active: AtomicBool,
    closed: AtomicBool,
}

impl CacheCore {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn teardown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tracker.clear_with(|entry| {
            if let Some(stmt) = entry.take_and_wait() {
                self.prepared_count.fetch_sub(1, Ordering::AcqRel);
                self.stats.inc_unprepared();
                if let Err(err) = stmt.close() {
                    tracing::warn!(
                        query = entry.query(),
                        error = %err,
                        "close failed during teardown"
                    );
                }
            }
        });
    }
}

/// Transparent prepared-statement cache over a database client.
///
/// Construct with [`StmtCache::new`] for defaults or via
/// [`StmtCacheBuilder`] for tuned limits. All methods take `&self`; the
/// cache is shared across threads behind the caller's own `Arc` or
/// borrowed references.
pub struct StmtCache {
    pub(crate) core: Arc<CacheCore>,
}

impl StmtCache {
    /// Creates a cache with default limits
    /// (16 prepared / 1024 tracked / 4096-byte queries / 5000-tick worker
    /// threshold).
    pub fn new(client: Arc<dyn DbClient>) -> Self {
        StmtCacheBuilder::new()
            .build(client)
            .unwrap_or_else(|_| unreachable!("default configuration is valid"))
    }

    /// Returns a builder for tuned limits.
    pub fn builder() -> StmtCacheBuilder {
        StmtCacheBuilder::new()
    }

    pub(crate) fn from_parts(client: Arc<dyn DbClient>, cfg: Config) -> Self {
        Self {
            core: Arc::new(CacheCore {
                tracker: StmtTracker::new(cfg.max_tracked_stmts),
                client,
                cfg,
                prepared_count: AtomicU32::new(0),
                stats: StatCounters::default(),
                ticks: AtomicU32::new(0),
                worker_active: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    // -- dispatch: pooled -------------------------------------------------

    /// Executes `query`, transparently using a prepared statement when one
    /// is live for this exact query string.
    pub fn execute(
        &self,
        deadline: &Deadline,
        query: &str,
        args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        match self.route(query) {
            Some(handle) => {
                self.core.stats.inc_hits();
                handle.stmt().execute(deadline, args)
            }
            None => {
                self.core.stats.inc_misses();
                self.core.client.execute(deadline, query, args)
            }
        }
    }

    /// Runs `query` for a lazy row-set, transparently using a prepared
    /// statement when one is live.
    pub fn query(
        &self,
        deadline: &Deadline,
        query: &str,
        args: &[Value],
    ) -> Result<Rows, DbError> {
        match self.route(query) {
            Some(handle) => {
                self.core.stats.inc_hits();
                handle.stmt().query(deadline, args)
            }
            None => {
                self.core.stats.inc_misses();
                self.core.client.query(deadline, query, args)
            }
        }
    }

    /// Runs `query` for a single row, transparently using a prepared
    /// statement when one is live.
    pub fn query_row(
        &self,
        deadline: &Deadline,
        query: &str,
        args: &[Value],
    ) -> Result<Row, DbError> {
        match self.route(query) {
            Some(handle) => {
                self.core.stats.inc_hits();
                handle.stmt().query_row(deadline, args)
            }
            None => {
                self.core.stats.inc_misses();
                self.core.client.query_row(deadline, query, args)
            }
        }
    }

    // -- dispatch: transactional ------------------------------------------

    /// [`execute`](Self::execute) inside an open transaction. A live
    /// prepared statement is first bound to the transaction through the
    /// client's standard rebinding mechanism.
    pub fn execute_tx(
        &self,
        deadline: &Deadline,
        tx: &dyn DbTransaction,
        query: &str,
        args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        match self.route(query) {
            Some(handle) => {
                self.core.stats.inc_hits();
                let bound = tx.bind(deadline, handle.stmt())?;
                bound.execute(deadline, args)
            }
            None => {
                self.core.stats.inc_misses();
                tx.execute(deadline, query, args)
            }
        }
    }

    /// [`query`](Self::query) inside an open transaction.
    pub fn query_tx(
        &self,
        deadline: &Deadline,
        tx: &dyn DbTransaction,
        query: &str,
        args: &[Value],
    ) -> Result<Rows, DbError> {
        match self.route(query) {
            Some(handle) => {
                self.core.stats.inc_hits();
                let bound = tx.bind(deadline, handle.stmt())?;
                bound.query(deadline, args)
            }
            None => {
                self.core.stats.inc_misses();
                tx.query(deadline, query, args)
            }
        }
    }

    /// [`query_row`](Self::query_row) inside an open transaction.
    pub fn query_row_tx(
        &self,
        deadline: &Deadline,
        tx: &dyn DbTransaction,
        query: &str,
        args: &[Value],
    ) -> Result<Row, DbError> {
        match self.route(query) {
            Some(handle) => {
                self.core.stats.inc_hits();
                let bound = tx.bind(deadline, handle.stmt())?;
                bound.query_row(deadline, args)
            }
            None => {
                self.core.stats.inc_misses();
                tx.query_row(deadline, query, args)
            }
        }
    }

    // -- routing ----------------------------------------------------------

    /// The shared front half of every dispatch: track the query, tick the
    /// worker clock, and try to borrow a live prepared statement.
    ///
    /// `None` sends the caller down the ad-hoc path. Skips (query too long)
    /// are counted here; misses are counted by the dispatch methods so the
    /// two stats stay mutually exclusive.
    fn route(&self, query: &str) -> Option<StmtHandle> {
        let core = &self.core;
        if core.is_closed() {
            return None;
        }
        if query.len() > core.cfg.max_query_len {
            core.stats.inc_skips();
            return None;
        }

        let entry = core.tracker.lookup(query);
        self.tick();

        let entry = match entry {
            Some(entry) => entry,
            None => core.tracker.insert_if_room(query)?,
        };
        entry.record_hit();
        entry.acquire()
    }

    /// Advances the global dispatch counter; the dispatch that crosses the
    /// threshold resets it and, if no worker is active, spawns one. A lost
    /// compare-exchange means another dispatch owns the launch.
    fn tick(&self) {
        let core = &self.core;
        let ticks = core.ticks.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if ticks <= core.cfg.promote_threshold {
            return;
        }
        if core
            .ticks
            .compare_exchange(ticks, 0, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        if core.is_closed() {
            return;
        }
        if core
            .worker_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let core = Arc::clone(core);
            thread::spawn(move || {
                promoter::run(&core);
                core.worker_active.store(false, Ordering::Release);
            });
        }
    }

    // -- lifecycle and observation ----------------------------------------

    /// Snapshot of the five monotone counters.
    pub fn stats(&self) -> StmtCacheStats {
        self.core.stats.snapshot()
    }

    /// Retires every prepared statement and drains the tracker.
    ///
    /// Idempotent. Afterwards every dispatch degrades to ad-hoc execution
    /// against the still-open client, counting misses. Waits for in-flight
    /// prepared executions to drain before closing their statements.
    pub fn teardown(&self) {
        self.core.teardown();
    }

    /// Number of tracked query strings.
    pub fn tracked_len(&self) -> usize {
        self.core.tracker.len()
    }

    /// Maximum number of tracked query strings (`max_tracked_stmts`).
    pub fn tracked_capacity(&self) -> usize {
        self.core.tracker.capacity()
    }

    /// Number of tracked entries currently holding a prepared statement.
    pub fn prepared_len(&self) -> usize {
        let mut count = 0;
        self.core.tracker.scan(|entry| {
            if entry.is_prepared() {
                count += 1;
            }
        });
        count
    }

    /// Whether `query` currently has a live prepared statement.
    pub fn is_prepared(&self, query: &str) -> bool {
        self.core
            .tracker
            .lookup(query)
            .is_some_and(|entry| entry.is_prepared())
    }

    /// The query strings currently holding prepared statements. Diagnostic;
    /// the set may change concurrently.
    pub fn prepared_queries(&self) -> Vec<String> {
        let mut queries = Vec::new();
        self.core.tracker.scan(|entry| {
            if entry.is_prepared() {
                queries.push(entry.query().to_string());
            }
        });
        queries
    }
}

impl Drop for StmtCache {
    /// Last-chance teardown so prepared statements are closed even when the
    /// caller forgets to call [`teardown`](Self::teardown).
    fn drop(&mut self) {
        self.core.teardown();
    }
}

impl std::fmt::Debug for StmtCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StmtCache")
            .field("tracked", &self.tracked_len())
            .field("prepared", &self.core.prepared_count.load(Ordering::Relaxed))
            .field("closed", &self.core.is_closed())
            .finish()
    }
}
