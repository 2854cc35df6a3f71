//! Counting fake database client shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::{
    DbClient, DbError, DbTransaction, Deadline, ExecOutcome, PreparedStmt, Row, Rows, Value,
};

#[derive(Default)]
struct ClientState {
    adhoc: AtomicUsize,
    prepares: AtomicUsize,
    stmt_execs: AtomicUsize,
    open: AtomicIsize,
    fail_prepare: AtomicBool,
    deadline_probe: Mutex<Option<Arc<AtomicUsize>>>,
}

impl ClientState {
    fn probe(&self, deadline: &Deadline) {
        if deadline.expires_at().is_some() {
            if let Some(probe) = self.deadline_probe.lock().as_ref() {
                probe.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Fake client that records every call and tracks open statements.
#[derive(Default)]
pub(crate) struct CountingClient {
    state: Arc<ClientState>,
}

impl CountingClient {
    pub(crate) fn adhoc_calls(&self) -> usize {
        self.state.adhoc.load(Ordering::Relaxed)
    }

    pub(crate) fn prepare_calls(&self) -> usize {
        self.state.prepares.load(Ordering::Relaxed)
    }

    pub(crate) fn stmt_calls(&self) -> usize {
        self.state.stmt_execs.load(Ordering::Relaxed)
    }

    pub(crate) fn open_stmts(&self) -> isize {
        self.state.open.load(Ordering::Relaxed)
    }

    pub(crate) fn fail_prepares(&self, fail: bool) {
        self.state.fail_prepare.store(fail, Ordering::Relaxed);
    }

    pub(crate) fn set_deadline_probe(&self, probe: Arc<AtomicUsize>) {
        *self.state.deadline_probe.lock() = Some(probe);
    }
}

impl DbClient for CountingClient {
    fn execute(
        &self,
        deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        self.state.probe(deadline);
        self.state.adhoc.fetch_add(1, Ordering::Relaxed);
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    fn query(&self, deadline: &Deadline, _query: &str, _args: &[Value]) -> Result<Rows, DbError> {
        self.state.probe(deadline);
        self.state.adhoc.fetch_add(1, Ordering::Relaxed);
        Ok(Rows::empty())
    }

    fn query_row(
        &self,
        deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<Row, DbError> {
        self.state.probe(deadline);
        self.state.adhoc.fetch_add(1, Ordering::Relaxed);
        Ok(Row::default())
    }

    fn prepare(&self, deadline: &Deadline, _query: &str) -> Result<Arc<dyn PreparedStmt>, DbError> {
        self.state.probe(deadline);
        if self.state.fail_prepare.load(Ordering::Relaxed) {
            return Err(DbError::new("prepare refused"));
        }
        self.state.prepares.fetch_add(1, Ordering::Relaxed);
        self.state.open.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(CountingStmt {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct CountingStmt {
    state: Arc<ClientState>,
    closed: AtomicBool,
}

impl PreparedStmt for CountingStmt {
    fn execute(&self, deadline: &Deadline, _args: &[Value]) -> Result<ExecOutcome, DbError> {
        self.state.probe(deadline);
        self.state.stmt_execs.fetch_add(1, Ordering::Relaxed);
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    fn query(&self, deadline: &Deadline, _args: &[Value]) -> Result<Rows, DbError> {
        self.state.probe(deadline);
        self.state.stmt_execs.fetch_add(1, Ordering::Relaxed);
        Ok(Rows::empty())
    }

    fn query_row(&self, deadline: &Deadline, _args: &[Value]) -> Result<Row, DbError> {
        self.state.probe(deadline);
        self.state.stmt_execs.fetch_add(1, Ordering::Relaxed);
        Ok(Row::default())
    }

    fn close(&self) -> Result<(), DbError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.state.open.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Fake transaction that records binds and ad-hoc calls.
#[derive(Default)]
pub(crate) struct CountingTx {
    binds: AtomicUsize,
    adhoc: AtomicUsize,
}

impl CountingTx {
    pub(crate) fn bind_calls(&self) -> usize {
        self.binds.load(Ordering::Relaxed)
    }

    pub(crate) fn adhoc_calls(&self) -> usize {
        self.adhoc.load(Ordering::Relaxed)
    }
}

impl DbTransaction for CountingTx {
    fn execute(
        &self,
        _deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        self.adhoc.fetch_add(1, Ordering::Relaxed);
        Ok(ExecOutcome::default())
    }

    fn query(&self, _deadline: &Deadline, _query: &str, _args: &[Value]) -> Result<Rows, DbError> {
        self.adhoc.fetch_add(1, Ordering::Relaxed);
        Ok(Rows::empty())
    }

    fn query_row(
        &self,
        _deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<Row, DbError> {
        self.adhoc.fetch_add(1, Ordering::Relaxed);
        Ok(Row::default())
    }

    fn bind(
        &self,
        _deadline: &Deadline,
        stmt: &Arc<dyn PreparedStmt>,
    ) -> Result<Box<dyn PreparedStmt>, DbError> {
        self.binds.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(BoundStmt(Arc::clone(stmt))))
    }
}

/// Transaction-scoped view over a pooled statement; closing it must not
/// close the pooled statement.
struct BoundStmt(Arc<dyn PreparedStmt>);

impl PreparedStmt for BoundStmt {
    fn execute(&self, deadline: &Deadline, args: &[Value]) -> Result<ExecOutcome, DbError> {
        self.0.execute(deadline, args)
    }

    fn query(&self, deadline: &Deadline, args: &[Value]) -> Result<Rows, DbError> {
        self.0.query(deadline, args)
    }

    fn query_row(&self, deadline: &Deadline, args: &[Value]) -> Result<Row, DbError> {
        self.0.query_row(deadline, args)
    }

    fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}
