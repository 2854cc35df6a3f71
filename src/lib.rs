//! stmtkit: a transparent prepared-statement cache for SQL database clients.
//!
//! The cache sits between an application and its database client. Callers
//! issue ad-hoc parameterized queries through the same execute / query /
//! query-row surface they would use against the raw client or an open
//! transaction; the cache counts query-string frequency and, in the
//! background, promotes the most frequent strings to server-side prepared
//! statements, rebinding traffic to them automatically. Statements that fall
//! out of the working set are closed and their budget slot reused.
//!
//! Queries are keyed by the **raw query string, byte for byte**. The cache
//! performs no SQL parsing or normalization: `SELECT 1` and `select 1` are
//! different keys, as are two spellings differing only in whitespace or
//! inlined literals. Phrase hot queries consistently — ideally with bind
//! parameters rather than interpolated values — or they will never
//! accumulate enough frequency to be promoted.
//!
//! See `docs` on each module for internals; the promotion policy lives in
//! the crate-private worker module.

pub mod builder;
pub mod cache;
pub mod client;
pub mod error;
pub mod prelude;
pub mod stats;

mod entry;
mod promoter;
mod tracker;

#[cfg(test)]
mod testutil;
