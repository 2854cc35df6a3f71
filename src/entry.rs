//! Per-query-string record and the handle-count rendezvous.
//!
//! ## Architecture
//!
//! ```text
//!   dispatcher threads                      background worker
//!   ──────────────────                      ─────────────────
//!   record_hit()  ──► hits: AtomicU32 ◄──   halve_hits()
//!
//!   acquire() ─┐                       ┌─ install(stmt)
//!              ▼                       ▼
//!        ┌───────────────────────────────────┐
//!        │ Mutex<Slot>                       │
//!        │   stmt:    Option<Arc<dyn ..>>    │
//!        │   handles: u32                    │
//!        └───────────────┬───────────────────┘
//!              ▲          │ handles == 0
//!   drop(StmtHandle)      ▼
//!              └──── Condvar (quiesce) ◄── take_and_wait()
//! ```
//!
//! ## Key Concepts
//!
//! - **Slot**: the prepared statement is either absent (the entry is just a
//!   frequency tally) or present (ready to dispatch through).
//! - **Handle**: an in-flight borrow of the present statement. While any
//!   handle is live the statement is never closed.
//! - **Rendezvous**: `take_and_wait` flips the slot to absent, then parks on
//!   the condvar until the last handle drops. After it returns, the taken
//!   statement has exactly one owner and may be closed.
//!
//! ## Implementation Notes
//!
//! One mutex guards both the slot and the handle count, so an acquire can
//! never observe a half-retired statement and the rendezvous cannot miss a
//! wakeup. The alternative — lock-free handles with an optimistic
//! increment-then-recheck rollback — saves a few nanoseconds on the fast
//! path at the cost of a spin-based wait; the uncontended `parking_lot`
//! mutex is cheap enough that the simpler protocol wins. The `hits` counter
//! stays a lock-free atomic either way: it is touched on every dispatch,
//! including ones that never acquire a handle.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::client::PreparedStmt;

struct Slot {
    stmt: Option<Arc<dyn PreparedStmt>>,
    handles: u32,
}

/// One tracked query string: an approximate frequency counter and an
/// optional live prepared statement with its in-flight handle count.
pub(crate) struct StmtEntry {
    query: String,
    hits: AtomicU32,
    slot: Mutex<Slot>,
    quiesced: Condvar,
}

impl StmtEntry {
    /// Creates an unprepared entry with an initial hit count of 1.
    pub(crate) fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            hits: AtomicU32::new(1),
            slot: Mutex::new(Slot {
                stmt: None,
                handles: 0,
            }),
            quiesced: Condvar::new(),
        }
    }

    /// The query string this entry tracks.
    pub(crate) fn query(&self) -> &str {
        &self.query
    }

    /// Current approximate hit count.
    pub(crate) fn hits(&self) -> u32 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Records one dispatch. Wraps on overflow; the counter is approximate.
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Halves the hit count. The CAS loop preserves concurrent increments:
    /// a hit landing between the load and the swap retries rather than
    /// being absorbed into the halving.
    pub(crate) fn halve_hits(&self) {
        let mut current = self.hits.load(Ordering::Relaxed);
        loop {
            match self.hits.compare_exchange_weak(
                current,
                current / 2,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Registers an in-flight borrow of the prepared statement.
    ///
    /// Returns `None` when the slot is absent; the caller falls back to
    /// ad-hoc execution. The returned handle releases itself on drop.
    pub(crate) fn acquire(self: &Arc<Self>) -> Option<StmtHandle> {
        let mut slot = self.slot.lock();
        let stmt = slot.stmt.clone()?;
        slot.handles += 1;
        Some(StmtHandle {
            entry: Arc::clone(self),
            stmt,
        })
    }

    /// Publishes a freshly prepared statement.
    ///
    /// Called only by the background worker, and only while the slot is
    /// absent.
    pub(crate) fn install(&self, stmt: Arc<dyn PreparedStmt>) {
        let mut slot = self.slot.lock();
        debug_assert!(slot.stmt.is_none(), "install over a live statement");
        slot.stmt = Some(stmt);
    }

    /// Retires the prepared statement: flips the slot to absent, waits for
    /// in-flight handles to drain, and returns the statement with sole
    /// ownership so the caller can close it.
    ///
    /// Returns `None` if the slot was already absent — a concurrent retirer
    /// (worker vs. teardown) won the race and owns the close. Callers
    /// arriving after the flip observe absent and fall back; they never
    /// acquire the dying statement.
    pub(crate) fn take_and_wait(&self) -> Option<Arc<dyn PreparedStmt>> {
        let mut slot = self.slot.lock();
        let taken = slot.stmt.take()?;
        while slot.handles > 0 {
            self.quiesced.wait(&mut slot);
        }
        Some(taken)
    }

    /// Non-blocking presence probe.
    pub(crate) fn is_prepared(&self) -> bool {
        self.slot.lock().stmt.is_some()
    }

    fn release(&self) {
        let mut slot = self.slot.lock();
        slot.handles -= 1;
        if slot.handles == 0 {
            self.quiesced.notify_all();
        }
    }
}

impl fmt::Debug for StmtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("StmtEntry")
            .field("query", &self.query)
            .field("hits", &self.hits())
            .field("prepared", &slot.stmt.is_some())
            .field("handles", &slot.handles)
            .finish()
    }
}

/// RAII borrow of a prepared statement.
///
/// Holds the entry's handle count up for its lifetime; dropping the handle
/// releases the count and wakes a retirer waiting for quiescence.
pub(crate) struct StmtHandle {
    entry: Arc<StmtEntry>,
    stmt: Arc<dyn PreparedStmt>,
}

impl StmtHandle {
    pub(crate) fn stmt(&self) -> &Arc<dyn PreparedStmt> {
        &self.stmt
    }
}

impl Drop for StmtHandle {
    fn drop(&mut self) {
        self.entry.release();
    }
}
