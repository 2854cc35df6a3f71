//! The background promotion worker.
//!
//! At most one worker runs at a time; the dispatch that crosses the tick
//! threshold spawns it. Each run performs four phases in order:
//!
//! 1. **Choose candidates** — one read-locked scan picks the prepared entry
//!    with the fewest hits (victim) and the unprepared entry with the most
//!    hits (replacement), then drops both when swapping would not improve
//!    the working set.
//! 2. **Evict** — only when the prepared budget is full: flip the victim to
//!    absent, wait for in-flight handles to drain, close the statement.
//! 3. **Prepare** — only while the budget has room: prepare the replacement
//!    under a 3-second deadline and publish it. Failures are swallowed; the
//!    entry stays unprepared and may be retried in a later cycle.
//! 4. **Decay and prune** — halve every hit counter, then delete cold
//!    unprepared entries so at most half the tracker remains occupied by
//!    tallies, dropping all zero-hit entries along the way.
//!
//! Halving on every cycle approximates an exponential moving average with a
//! half-life of one tick threshold, which turns the raw counters into a
//! rough LFU-with-aging policy without per-entry timestamps.
//!
//! The worker never observes caller deadlines and its errors never reach
//! callers; they surface only through the statistics counters and trace
//! events.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheCore;
use crate::client::Deadline;
use crate::entry::StmtEntry;

/// Deadline for each Prepare issued by the worker. Close runs unbounded.
const PREPARE_TIMEOUT: Duration = Duration::from_secs(3);

/// One full promotion cycle. Runs on the worker thread; also invoked
/// directly by tests for deterministic phase coverage.
pub(crate) fn run(core: &CacheCore) {
    if core.is_closed() {
        return;
    }

    let (victim, replacement) = pick_candidates(core);

    if let Some(victim) = victim {
        if core.prepared_count.load(Ordering::Acquire) >= core.cfg.max_prepared_stmts {
            evict(core, &victim);
        }
    }
    if let Some(replacement) = replacement {
        if core.prepared_count.load(Ordering::Acquire) < core.cfg.max_prepared_stmts {
            prepare(core, &replacement);
        }
    }

    decay(core);
    prune(core);
}

/// Phase 1: single read-locked scan plus the no-churn policy.
fn pick_candidates(core: &CacheCore) -> (Option<Arc<StmtEntry>>, Option<Arc<StmtEntry>>) {
    let mut victim: Option<(Arc<StmtEntry>, u32)> = None;
    let mut replacement: Option<(Arc<StmtEntry>, u32)> = None;

    core.tracker.scan(|entry| {
        let hits = entry.hits();
        if entry.is_prepared() {
            if victim.as_ref().map_or(true, |(_, best)| *best > hits) {
                victim = Some((Arc::clone(entry), hits));
            }
        } else if replacement.as_ref().map_or(true, |(_, best)| *best < hits) {
            replacement = Some((Arc::clone(entry), hits));
        }
    });

    let v_hits = victim.as_ref().map(|(_, hits)| *hits);
    let r_hits = replacement.as_ref().map(|(_, hits)| *hits);
    let no_improvement = match (v_hits, r_hits) {
        // a still-warm victim with nothing to replace it: leave it alone
        (Some(v), None) => v > 0,
        // swapping equals or loses: churn would not help
        (Some(v), Some(r)) => v >= r,
        _ => false,
    };
    if no_improvement {
        return (None, None);
    }

    (
        victim.map(|(entry, _)| entry),
        replacement.map(|(entry, _)| entry),
    )
}

/// Phase 2: retire the victim's statement once its handles drain.
fn evict(core: &CacheCore, victim: &StmtEntry) {
    let Some(stmt) = victim.take_and_wait() else {
        // teardown or a previous cycle already took it
        return;
    };
    core.prepared_count.fetch_sub(1, Ordering::AcqRel);
    core.stats.inc_unprepared();
    if let Err(err) = stmt.close() {
        tracing::debug!(query = victim.query(), error = %err, "close failed during eviction");
    }
}

/// Phase 3: prepare the replacement and publish it.
fn prepare(core: &CacheCore, replacement: &StmtEntry) {
    let deadline = Deadline::within(PREPARE_TIMEOUT);
    match core.client.prepare(&deadline, replacement.query()) {
        Ok(stmt) => {
            // Publish under the tracker read lock: teardown sets the closed
            // flag before taking the write lock, so either we observe the
            // flag here, or teardown's sweep observes the installed
            // statement and closes it.
            let _guard = core.tracker.read_guard();
            if core.is_closed() {
                drop(_guard);
                let _ = stmt.close();
                return;
            }
            replacement.install(stmt);
            core.prepared_count.fetch_add(1, Ordering::AcqRel);
            core.stats.inc_prepared();
        }
        Err(err) => {
            tracing::debug!(
                query = replacement.query(),
                error = %err,
                "prepare failed; entry stays unprepared"
            );
        }
    }
}

/// Phase 4a: halve every counter. Lossy under concurrent increments, which
/// is the intended approximation.
fn decay(core: &CacheCore) {
    core.tracker.scan(|entry| entry.halve_hits());
}

/// Phase 4b: collect cold unprepared entries and delete the excess.
///
/// At most `max_tracked / 2` unprepared tallies survive a cycle, and
/// zero-hit entries never do. Collection appends to an empty list so the
/// sort sees exactly one record per unprepared entry.
fn prune(core: &CacheCore) {
    let keep = core.cfg.max_tracked_stmts / 2;

    let mut cold: Vec<(u32, String)> = Vec::new();
    {
        let map = core.tracker.read_guard();
        if map.len() < keep {
            return;
        }
        for entry in map.values() {
            if !entry.is_prepared() {
                cold.push((entry.hits(), entry.query().to_string()));
            }
        }
    }

    cold.sort_unstable_by_key(|(hits, _)| *hits);

    let mut victims = cold.len().saturating_sub(keep);
    while victims < cold.len() && cold[victims].0 == 0 {
        victims += 1;
    }
    if victims == 0 {
        return;
    }

    let keys: Vec<String> = cold[..victims]
        .iter()
        .map(|(_, query)| query.clone())
        .collect();
    core.tracker.remove_cold(&keys);
    tracing::trace!(removed = keys.len(), "pruned cold entries");
}
