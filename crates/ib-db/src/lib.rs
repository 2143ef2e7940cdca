//! ib-db: SQLite persistence for ironbean models.
//!
//! This crate provides connection pooling, schema introspection and additive
//! schema synchronisation, the cascading record writer, the reader with its
//! query builder, and read-side relation resolution.

pub mod cache;
pub mod conn;
pub mod ddl;
pub mod diff;
pub mod pool;
pub mod query;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod tables;
pub mod writer;

pub use conn::SqlConnection;
pub use query::Query;
pub use resolver::Resolved;
