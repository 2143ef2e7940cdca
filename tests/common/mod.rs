//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which opens a [`Database`] on a private in-memory
//! SQLite pool, plus small helpers for building models and peeking at raw
//! rows.

#![allow(dead_code)]

use ironbean::{Config, Database, IdMode, Model, Value};
use ib_db::conn::{Row, SqlConnection};
use ib_db::pool::get_conn;

/// Test harness wrapping a [`Database`] backed by an in-memory pool.
pub struct TestHarness {
    pub db: Database,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness that hands out UUID keys.
    pub fn uuid() -> Self {
        let mut config = Config::default();
        config.database.id_mode = IdMode::Uuid;
        Self::with_config(config)
    }

    /// Create a new harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let db = Database::open(&config).expect("failed to open database");
        Self { db }
    }

    /// Run a raw query on a pooled connection.
    pub fn rows(&self, sql: &str) -> Vec<Row> {
        let conn = get_conn(self.db.pool()).expect("failed to get db connection");
        conn.execute_query(sql, &[]).expect("query failed")
    }

    /// Names of the live columns of `table`.
    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.db
            .columns(table)
            .expect("columns failed")
            .into_keys()
            .collect()
    }
}

/// A model of `table` with the given plain properties.
pub fn model(table: &str, props: &[(&str, Value)]) -> Model {
    let mut m = Model::new(table).expect("valid table");
    for (key, value) in props {
        m.set(key, value.clone()).expect("valid property");
    }
    m
}

/// A model of `table` with only a `name`.
pub fn named(table: &str, name: &str) -> Model {
    model(table, &[("name", Value::from(name))])
}
