//! The connection interface the engine needs, and its SQLite implementation.
//!
//! Everything above this module speaks [`SqlConnection`]; only this module
//! knows about `rusqlite`.

use std::collections::BTreeMap;

use ib_core::{Error, Result, TypeTag, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::ddl::quote_identifier;
use crate::schema::{ColumnDef, ForeignKey, TableSchema};

/// A result row: column name to raw value.
pub type Row = BTreeMap<String, Value>;

/// Transactional SQL execution against a single backend connection.
pub trait SqlConnection {
    /// Run a statement and return the number of rows affected.
    fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run a query and return all rows.
    fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;

    /// Row id generated by the most recent successful insert.
    fn last_insert_id(&self) -> i64;

    /// Columns and constraints of `name`, or `None` if there is no such table.
    fn introspect_table(&self, name: &str) -> Result<Option<TableSchema>>;

    /// Names of all user tables.
    fn list_tables(&self) -> Result<Vec<String>>;
}

/// Run `f` inside one transaction. On error the transaction is rolled back
/// and the error returned unchanged.
pub fn in_transaction<T>(
    conn: &dyn SqlConnection,
    tier: &str,
    f: impl FnOnce(&dyn SqlConnection) -> Result<T>,
) -> Result<T> {
    conn.begin()?;
    tracing::debug!(tier, "BEGIN");

    let result = f(conn).and_then(|value| conn.commit().map(|()| value));
    match result {
        Ok(value) => {
            tracing::debug!(tier, "COMMIT");
            Ok(value)
        }
        Err(e) => {
            tracing::warn!(tier, "rolling back: {e}");
            if let Err(rb) = conn.rollback() {
                tracing::warn!(tier, "rollback failed: {rb}");
            }
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// rusqlite
// ---------------------------------------------------------------------------

fn to_sql(value: &Value) -> SqlValue {
    match TypeTag::encode(value) {
        Value::Null => SqlValue::Null,
        Value::Int(n) => SqlValue::Integer(n),
        Value::Float(f) => SqlValue::Real(f),
        Value::Text(s) => SqlValue::Text(s),
        // `encode` turns booleans into integers and JSON into text.
        Value::Bool(b) => SqlValue::Integer(i64::from(b)),
        Value::Json(j) => SqlValue::Text(j.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl SqlConnection for rusqlite::Connection {
    fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<usize> {
        tracing::debug!(sql, params = params.len(), "execute");
        self.execute(sql, rusqlite::params_from_iter(params.iter().map(to_sql)))
            .map_err(Error::database)
    }

    fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::debug!(sql, params = params.len(), "query");
        let mut stmt = self.prepare(sql).map_err(Error::database)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(to_sql)))
            .map_err(Error::database)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(Error::database)? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                let value = row.get_ref(i).map_err(Error::database)?;
                record.insert(name.clone(), from_sql(value));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn begin(&self) -> Result<()> {
        self.execute_batch("BEGIN").map_err(Error::database)
    }

    fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT").map_err(Error::database)
    }

    fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK").map_err(Error::database)
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_rowid()
    }

    fn introspect_table(&self, name: &str) -> Result<Option<TableSchema>> {
        let quoted = quote_identifier(name);
        let mut stmt = self
            .prepare(&format!("PRAGMA table_info({quoted})"))
            .map_err(Error::database)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnDef::introspected(
                    row.get::<_, String>("name")?,
                    row.get::<_, Option<String>>("type")?.unwrap_or_default(),
                    row.get::<_, i64>("notnull")? != 0,
                    row.get::<_, i64>("pk")? != 0,
                ))
            })
            .map_err(Error::database)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::database)?;

        if columns.is_empty() {
            return Ok(None);
        }

        let mut stmt = self
            .prepare(&format!("PRAGMA foreign_key_list({quoted})"))
            .map_err(Error::database)?;
        let foreign_keys = stmt
            .query_map([], |row| {
                Ok(ForeignKey {
                    column: row.get("from")?,
                    table: row.get("table")?,
                    referenced_column: row
                        .get::<_, Option<String>>("to")?
                        .unwrap_or_else(|| "id".to_string()),
                })
            })
            .map_err(Error::database)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::database)?;

        Ok(Some(TableSchema {
            name: name.to_string(),
            columns,
            foreign_keys,
        }))
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(Error::database)?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(Error::database)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(Error::database)?;
        Ok(names)
    }
}
