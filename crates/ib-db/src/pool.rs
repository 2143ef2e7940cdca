//! Connection pool management for SQLite via r2d2.

use ib_core::{Error, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a database pool backed by a file on disk.
///
/// Creates the SQLite file if it does not exist and enables foreign keys and
/// WAL journal mode on every new connection. No tables are created: schema is
/// derived from the records that are stored.
pub fn init_pool(db_path: &str, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;",
        )
    });

    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

    tracing::info!(path = db_path, "Opened database");
    Ok(pool)
}

/// Initialize an in-memory database pool.
///
/// Each call creates a uniquely-named shared-cache in-memory database so
/// that parallel tests do not interfere with each other, while all
/// connections *within* a single pool still share state.
pub fn init_memory_pool_sized(max_size: u32) -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:ironbean_mem_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {e}")))
}

/// In-memory pool with the default size (useful for tests).
pub fn init_memory_pool() -> Result<DbPool> {
    init_memory_pool_sized(4)
}

/// Convenience helper to get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {e}")))
}
