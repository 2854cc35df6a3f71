//! Error types for the stmtkit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. a prepared-statement budget of zero, an out-of-range query-length
//!   limit).
//!
//! Database failures are reported through
//! [`DbError`](crate::client::DbError), which originates in the caller's
//! database client and is propagated by the cache unchanged.
//!
//! ## Example Usage
//!
//! ```
//! use stmtkit::builder::StmtCacheBuilder;
//! use stmtkit::error::ConfigError;
//!
//! // Fallible validation for user-configurable parameters
//! let ok = StmtCacheBuilder::new().max_prepared_stmts(64).validate();
//! assert!(ok.is_ok());
//!
//! // An out-of-range budget is caught without panicking
//! let bad: Result<(), ConfigError> =
//!     StmtCacheBuilder::new().max_prepared_stmts(0).validate();
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`StmtCacheBuilder::validate`](crate::builder::StmtCacheBuilder::validate)
/// and [`StmtCacheBuilder::build`](crate::builder::StmtCacheBuilder::build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use stmtkit::builder::StmtCacheBuilder;
///
/// let err = StmtCacheBuilder::new().max_query_len(4).validate().unwrap_err();
/// assert!(err.to_string().contains("max_query_len"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
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

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
