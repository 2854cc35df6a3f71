//! Validated construction of a [`StmtCache`].
//!
//! All four limits have inclusive validation ranges checked by
//! [`StmtCacheBuilder::build`]; an out-of-range value yields a
//! [`ConfigError`] instead of a misconfigured cache.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stmtkit::builder::StmtCacheBuilder;
//!
//! let cache = StmtCacheBuilder::new()
//!     .max_prepared_stmts(32)
//!     .max_query_len(16 * 1024)
//!     .build(Arc::new(my_driver))?;
//! ```

use std::sync::Arc;

use crate::cache::{Config, StmtCache};
use crate::client::DbClient;
use crate::error::ConfigError;

/// Default cap on concurrently-live prepared statements.
pub const DEFAULT_MAX_PREPARED_STMTS: u32 = 16;
/// Default cap on tracked query strings.
pub const DEFAULT_MAX_TRACKED_STMTS: usize = 1024;
/// Default cap on the length of a cacheable query, in bytes.
pub const DEFAULT_MAX_QUERY_LEN: usize = 4096;
/// Default number of dispatches between promotion-worker launches.
pub const DEFAULT_PROMOTE_THRESHOLD: u32 = 5000;

/// Builder for [`StmtCache`] with validated limits.
#[derive(Debug, Clone)]
pub struct StmtCacheBuilder {
    max_prepared_stmts: u32,
    max_tracked_stmts: usize,
    max_query_len: usize,
    promote_threshold: u32,
}

impl Default for StmtCacheBuilder {
    fn default() -> Self {
        Self {
            max_prepared_stmts: DEFAULT_MAX_PREPARED_STMTS,
            max_tracked_stmts: DEFAULT_MAX_TRACKED_STMTS,
            max_query_len: DEFAULT_MAX_QUERY_LEN,
            promote_threshold: DEFAULT_PROMOTE_THRESHOLD,
        }
    }
}

impl StmtCacheBuilder {
    /// Starts from the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of prepared statements live at any one time.
    ///
    /// Valid range `[1, 4096]`. Some databases bound how many statements
    /// may be prepared across all clients and connections; size this
    /// accordingly.
    pub fn max_prepared_stmts(mut self, max: u32) -> Self {
        self.max_prepared_stmts = max;
        self
    }

    /// Soft upper bound on how many distinct query strings to track when
    /// estimating frequency. Valid range `[128, 65536]`.
    pub fn max_tracked_stmts(mut self, max: usize) -> Self {
        self.max_tracked_stmts = max;
        self
    }

    /// Maximum byte length of a query eligible for caching; longer queries
    /// always execute ad-hoc. Valid range `[32, 1048576]`.
    pub fn max_query_len(mut self, max: usize) -> Self {
        self.max_query_len = max;
        self
    }

    /// Number of dispatches between promotion-worker launches. Must be at
    /// least 1; set it arbitrarily high to keep the worker from ever
    /// launching.
    pub fn promote_threshold(mut self, threshold: u32) -> Self {
        self.promote_threshold = threshold;
        self
    }

    /// Checks every limit against its valid range.
    ///
    /// # Example
    ///
    /// ```
    /// use stmtkit::builder::StmtCacheBuilder;
    ///
    /// assert!(StmtCacheBuilder::new().validate().is_ok());
    /// assert!(StmtCacheBuilder::new().max_tracked_stmts(64).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_prepared_stmts < 1 || self.max_prepared_stmts > 1 << 12 {
            return Err(ConfigError::new(
                "max_prepared_stmts must be between 1 and 4096",
            ));
        }
        if self.max_tracked_stmts < 128 || self.max_tracked_stmts > 1 << 16 {
            return Err(ConfigError::new(
                "max_tracked_stmts must be between 128 and 65536",
            ));
        }
        if self.max_query_len < 32 || self.max_query_len > 1 << 20 {
            return Err(ConfigError::new(
                "max_query_len must be between 32 and 1048576",
            ));
        }
        if self.promote_threshold < 1 {
            return Err(ConfigError::new("promote_threshold must be at least 1"));
        }
        Ok(())
    }

    /// Validates the limits and builds the cache over `client`.
    pub fn build(self, client: Arc<dyn DbClient>) -> Result<StmtCache, ConfigError> {
        self.validate()?;
        Ok(StmtCache::from_parts(
            client,
            Config {
                max_prepared_stmts: self.max_prepared_stmts,
                max_tracked_stmts: self.max_tracked_stmts,
                max_query_len: self.max_query_len,
                promote_threshold: self.promote_threshold,
            },
        ))
    }
}
