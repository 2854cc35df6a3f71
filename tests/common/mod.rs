// Shared counting fake for the integration tests: a DbClient that hands out
// canned results and tracks every prepare/close so the suites can assert
// zero-leak round trips.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use stmtkit::client::{
    DbClient, DbError, DbTransaction, Deadline, ExecOutcome, PreparedStmt, Row, Rows, Value,
};

#[derive(Default)]
struct DbState {
    adhoc_calls: AtomicU64,
    prepare_calls: AtomicU64,
    prepared_execs: AtomicU64,
    open_stmts: AtomicI64,
    fail_prepare: AtomicBool,
}

/// In-memory stand-in for a pooled database handle.
#[derive(Default)]
pub struct FakeDb {
    state: Arc<DbState>,
}

impl FakeDb {
    pub fn adhoc_calls(&self) -> u64 {
        self.state.adhoc_calls.load(Ordering::Relaxed)
    }

    pub fn prepare_calls(&self) -> u64 {
        self.state.prepare_calls.load(Ordering::Relaxed)
    }

    pub fn prepared_execs(&self) -> u64 {
        self.state.prepared_execs.load(Ordering::Relaxed)
    }

    /// Statements prepared and not yet closed.
    pub fn open_statements(&self) -> i64 {
        self.state.open_stmts.load(Ordering::Relaxed)
    }

    pub fn fail_prepares(&self, fail: bool) {
        self.state.fail_prepare.store(fail, Ordering::Relaxed);
    }

    pub fn begin(&self) -> FakeTx {
        FakeTx {
            state: Arc::clone(&self.state),
            bind_calls: AtomicU64::new(0),
            adhoc_calls: AtomicU64::new(0),
        }
    }

    fn canned_row() -> Row {
        Row::new(vec![Value::Integer(1), Value::Text("one".into())])
    }
}

impl DbClient for FakeDb {
    fn execute(
        &self,
        _deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        self.state.adhoc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: Some(1),
        })
    }

    fn query(&self, _deadline: &Deadline, _query: &str, _args: &[Value]) -> Result<Rows, DbError> {
        self.state.adhoc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Rows::from_rows(vec![Self::canned_row()]))
    }

    fn query_row(
        &self,
        _deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<Row, DbError> {
        self.state.adhoc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Self::canned_row())
    }

    fn prepare(
        &self,
        _deadline: &Deadline,
        query: &str,
    ) -> Result<Arc<dyn PreparedStmt>, DbError> {
        if self.state.fail_prepare.load(Ordering::Relaxed) {
            return Err(DbError::new(format!("prepare refused: {query}")));
        }
        self.state.prepare_calls.fetch_add(1, Ordering::Relaxed);
        self.state.open_stmts.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(FakeStmt {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeStmt {
    state: Arc<DbState>,
    closed: AtomicBool,
}

impl PreparedStmt for FakeStmt {
    fn execute(&self, _deadline: &Deadline, _args: &[Value]) -> Result<ExecOutcome, DbError> {
        self.state.prepared_execs.fetch_add(1, Ordering::Relaxed);
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: Some(1),
        })
    }

    fn query(&self, _deadline: &Deadline, _args: &[Value]) -> Result<Rows, DbError> {
        self.state.prepared_execs.fetch_add(1, Ordering::Relaxed);
        Ok(Rows::from_rows(vec![FakeDb::canned_row()]))
    }

    fn query_row(&self, _deadline: &Deadline, _args: &[Value]) -> Result<Row, DbError> {
        self.state.prepared_execs.fetch_add(1, Ordering::Relaxed);
        Ok(FakeDb::canned_row())
    }

    fn close(&self) -> Result<(), DbError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.state.open_stmts.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// In-memory stand-in for an open transaction.
pub struct FakeTx {
    state: Arc<DbState>,
    bind_calls: AtomicU64,
    adhoc_calls: AtomicU64,
}

impl FakeTx {
    pub fn bind_calls(&self) -> u64 {
        self.bind_calls.load(Ordering::Relaxed)
    }

    pub fn adhoc_calls(&self) -> u64 {
        self.adhoc_calls.load(Ordering::Relaxed)
    }
}

impl DbTransaction for FakeTx {
    fn execute(
        &self,
        _deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        self.adhoc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: Some(1),
        })
    }

    fn query(&self, _deadline: &Deadline, _query: &str, _args: &[Value]) -> Result<Rows, DbError> {
        self.adhoc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Rows::from_rows(vec![FakeDb::canned_row()]))
    }

    fn query_row(
        &self,
        _deadline: &Deadline,
        _query: &str,
        _args: &[Value],
    ) -> Result<Row, DbError> {
        self.adhoc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(FakeDb::canned_row())
    }

    fn bind(
        &self,
        _deadline: &Deadline,
        stmt: &Arc<dyn PreparedStmt>,
    ) -> Result<Box<dyn PreparedStmt>, DbError> {
        self.bind_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(TxStmt(Arc::clone(stmt))))
    }
}

// Transaction-scoped statement view; closing it leaves the pooled statement
// open.
struct TxStmt(Arc<dyn PreparedStmt>);

impl PreparedStmt for TxStmt {
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
