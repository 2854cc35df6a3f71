//! # Database-Client Contract
//!
//! This module defines the trait hierarchy the cache dispatches through, plus
//! the driver-agnostic value, row, and deadline types that cross it. The
//! cache itself never interprets queries, arguments, or results; it only
//! routes them.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                      DbClient (pooled)                       │
//!   │                                                              │
//!   │  execute(&Deadline, &str, &[Value])  → ExecOutcome           │
//!   │  query(&Deadline, &str, &[Value])    → Rows (lazy)           │
//!   │  query_row(&Deadline, &str, &[Value])→ Row                   │
//!   │  prepare(&Deadline, &str)            → Arc<dyn PreparedStmt> │
//!   └──────────────────────────┬───────────────────────────────────┘
//!                              │ prepare
//!                              ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        PreparedStmt                          │
//!   │                                                              │
//!   │  execute / query / query_row (&Deadline, &[Value])           │
//!   │  close()                                                     │
//!   └──────────────────────────┬───────────────────────────────────┘
//!                              │ bind
//!   ┌──────────────────────────┴───────────────────────────────────┐
//!   │                       DbTransaction                          │
//!   │                                                              │
//!   │  execute / query / query_row (&Deadline, &str, &[Value])     │
//!   │  bind(&Deadline, &Arc<dyn PreparedStmt>)                     │
//!   │      → Box<dyn PreparedStmt>  (transaction-scoped)           │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Object safety**: all three traits are object-safe; the cache holds
//!   `Arc<dyn DbClient>` and publishes `Arc<dyn PreparedStmt>` so in-flight
//!   callers can keep executing a statement the background worker is about
//!   to retire.
//! - **Deadline forwarding**: every operation takes a [`Deadline`]. The cache
//!   forwards the caller's deadline verbatim to every database call it makes
//!   on the caller's behalf; it never inspects or tightens it.
//! - **Error transparency**: a [`DbError`] originates in the client and is
//!   returned to the caller unchanged. The cache never retries user queries.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stmtkit::client::{DbClient, Deadline, Value};
//!
//! fn lookup(db: &dyn DbClient, id: i64) -> Result<(), stmtkit::client::DbError> {
//!     let row = db.query_row(
//!         &Deadline::none(),
//!         "SELECT name FROM users WHERE id = ?",
//!         &[Value::Integer(id)],
//!     )?;
//!     println!("{:?}", row.get(0));
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`: prepared statements are shared across
//! dispatching threads and closed from the background worker thread.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Values and results
// ---------------------------------------------------------------------------

/// A single SQL argument or column value, driver-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A signed 64-bit integer.
    Integer(i64),
    /// A 64-bit float.
    Real(f64),
    /// A text string.
    Text(String),
    /// A binary blob.
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Result of an `execute` call: affected row count and, where the driver
/// reports one, the last inserted row id.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// A single result row.
///
/// # Example
///
/// ```
/// use stmtkit::client::{Row, Value};
///
/// let row = Row::new(vec![Value::Integer(7), Value::Text("seven".into())]);
/// assert_eq!(row.len(), 2);
/// assert_eq!(row.get(0), Some(&Value::Integer(7)));
/// assert_eq!(row.get(2), None);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from its column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the value at `idx`, or `None` past the last column.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the row, yielding its column values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A lazy row-set: rows are produced on demand and each pull may fail.
///
/// # Example
///
/// ```
/// use stmtkit::client::{Row, Rows, Value};
///
/// let rows = Rows::from_rows(vec![Row::new(vec![Value::Integer(1)])]);
/// let collected: Result<Vec<Row>, _> = rows.collect();
/// assert_eq!(collected.unwrap().len(), 1);
/// ```
pub struct Rows {
    inner: Box<dyn Iterator<Item = Result<Row, DbError>> + Send>,
}

impl Rows {
    /// Wraps an iterator of fallible rows.
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<Row, DbError>> + Send + 'static,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    /// An empty row-set.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// A row-set over already-materialized rows.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(rows.into_iter().map(Ok))
    }
}

impl Iterator for Rows {
    type Item = Result<Row, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rows(..)")
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// A cancellation/deadline token forwarded to every database operation.
///
/// The cache never interprets the deadline; it is the client's job to honor
/// it. [`Deadline::none`] means "no limit".
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stmtkit::client::Deadline;
///
/// let unbounded = Deadline::none();
/// assert!(!unbounded.expired());
/// assert_eq!(unbounded.remaining(), None);
///
/// let tight = Deadline::within(Duration::from_secs(3));
/// assert!(!tight.expired());
/// assert!(tight.remaining().unwrap() <= Duration::from_secs(3));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline: operations may run indefinitely.
    pub fn none() -> Self {
        Self(None)
    }

    /// A deadline `timeout` from now.
    pub fn within(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// A deadline at the given instant.
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// The instant this deadline expires, if any.
    pub fn expires_at(&self) -> Option<Instant> {
        self.0
    }

    /// Time left before expiry; `None` when unbounded, zero when already
    /// past.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// DbError
// ---------------------------------------------------------------------------

/// A failure reported by the database client.
///
/// The cache propagates these unchanged: an error from an ad-hoc call, a
/// prepared execution, or a transaction binding reaches the caller exactly
/// as the client produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError(String);

impl DbError {
    /// Creates a new `DbError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DbError {}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A live server-side prepared statement.
///
/// Obtained from [`DbClient::prepare`]; executed by supplying only
/// arguments. `close` releases the server-side plan; the cache guarantees
/// it is called at most once per statement, and only after all in-flight
/// executions through the statement have drained.
pub trait PreparedStmt: Send + Sync {
    /// Executes the statement, returning row-count/last-id.
    fn execute(&self, deadline: &Deadline, args: &[Value]) -> Result<ExecOutcome, DbError>;

    /// Executes the statement, returning a lazy row-set.
    fn query(&self, deadline: &Deadline, args: &[Value]) -> Result<Rows, DbError>;

    /// Executes the statement, returning a single row.
    fn query_row(&self, deadline: &Deadline, args: &[Value]) -> Result<Row, DbError>;

    /// Closes the statement, releasing its server-side resources.
    fn close(&self) -> Result<(), DbError>;
}

/// A pooled database handle capable of ad-hoc execution and statement
/// preparation.
pub trait DbClient: Send + Sync {
    /// Ad-hoc execute: query string plus arguments, no pre-compiled plan.
    fn execute(
        &self,
        deadline: &Deadline,
        query: &str,
        args: &[Value],
    ) -> Result<ExecOutcome, DbError>;

    /// Ad-hoc query returning a lazy row-set.
    fn query(&self, deadline: &Deadline, query: &str, args: &[Value]) -> Result<Rows, DbError>;

    /// Ad-hoc query returning a single row.
    fn query_row(&self, deadline: &Deadline, query: &str, args: &[Value])
        -> Result<Row, DbError>;

    /// Prepares `query` server-side, returning a reusable statement handle.
    fn prepare(&self, deadline: &Deadline, query: &str) -> Result<Arc<dyn PreparedStmt>, DbError>;
}

/// An open transaction.
///
/// Supports the same three execution shapes as [`DbClient`], plus `bind`,
/// which re-scopes an existing pooled prepared statement to this
/// transaction (the driver's standard statement-rebinding mechanism).
pub trait DbTransaction: Send + Sync {
    /// Ad-hoc execute inside the transaction.
    fn execute(
        &self,
        deadline: &Deadline,
        query: &str,
        args: &[Value],
    ) -> Result<ExecOutcome, DbError>;

    /// Ad-hoc query inside the transaction.
    fn query(&self, deadline: &Deadline, query: &str, args: &[Value]) -> Result<Rows, DbError>;

    /// Ad-hoc single-row query inside the transaction.
    fn query_row(&self, deadline: &Deadline, query: &str, args: &[Value])
        -> Result<Row, DbError>;

    /// Binds a pooled prepared statement to this transaction, returning a
    /// transaction-scoped handle. The returned handle is short-lived; its
    /// `close` must not close the underlying pooled statement.
    fn bind(
        &self,
        deadline: &Deadline,
        stmt: &Arc<dyn PreparedStmt>,
    ) -> Result<Box<dyn PreparedStmt>, DbError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
