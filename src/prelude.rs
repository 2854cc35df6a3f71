pub use crate::builder::StmtCacheBuilder;
pub use crate::cache::StmtCache;
pub use crate::client::{
    DbClient, DbError, DbTransaction, Deadline, ExecOutcome, PreparedStmt, Row, Rows, Value,
};
pub use crate::error::ConfigError;
pub use crate::stats::StmtCacheStats;
