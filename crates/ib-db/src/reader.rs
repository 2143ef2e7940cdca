//! Record reads.
//!
//! Rows come back as raw backend values. The live schema's type tags turn them
//! back into typed properties. A table that does not exist reads as empty.

use std::sync::Arc;

use ib_core::{Error, Model, RecordId, Result, Value};

use crate::conn::{Row, SqlConnection};
use crate::query::Query;
use crate::schema::TableSchema;
use crate::tables::TableManager;

pub struct RecordReader {
    tables: Arc<TableManager>,
}

/// Build a loaded model from a row, decoding each column by its tag.
fn to_model(schema: &TableSchema, mut row: Row) -> Result<Model> {
    let raw_id = row.remove("id").unwrap_or(Value::Null);
    let id = RecordId::from_value(&raw_id).ok_or_else(|| {
        Error::Internal(format!("row of `{}` has no usable id: {raw_id:?}", schema.name))
    })?;

    let properties = row
        .into_iter()
        .map(|(name, raw)| {
            let value = match schema.column(&name).and_then(|c| c.tag) {
                Some(tag) => tag.decode(raw),
                None => raw,
            };
            (name, value)
        })
        .collect();
    Ok(Model::from_row(&schema.name, id, properties))
}

impl RecordReader {
    pub fn new(tables: Arc<TableManager>) -> Self {
        Self { tables }
    }

    /// Fetch one record by primary key. `None` when absent.
    pub fn load(
        &self,
        conn: &dyn SqlConnection,
        table: &str,
        id: &RecordId,
    ) -> Result<Option<Model>> {
        self.find_one(conn, &Query::table(table).eq("id", id.to_value()))
    }

    /// Every record of `table`, in id order.
    pub fn load_all(&self, conn: &dyn SqlConnection, table: &str) -> Result<Vec<Model>> {
        self.find(conn, &Query::table(table).order_by("id", true))
    }

    pub fn find(&self, conn: &dyn SqlConnection, query: &Query) -> Result<Vec<Model>> {
        let Some(schema) = self.tables.live(conn, query.table_name())? else {
            return Ok(Vec::new());
        };
        let (sql, params) = query.to_sql()?;
        conn.execute_query(&sql, &params)?
            .into_iter()
            .map(|row| to_model(&schema, row))
            .collect()
    }

    /// The first match of `query`, if any.
    pub fn find_one(&self, conn: &dyn SqlConnection, query: &Query) -> Result<Option<Model>> {
        let query = query.clone().limit(1);
        Ok(self.find(conn, &query)?.into_iter().next())
    }

    /// Number of rows matching `query`.
    pub fn count(&self, conn: &dyn SqlConnection, query: &Query) -> Result<u64> {
        if !self.tables.table_exists(conn, query.table_name())? {
            return Ok(0);
        }
        let (sql, params) = query.to_count_sql()?;
        let rows = conn.execute_query(&sql, &params)?;
        let n = rows
            .first()
            .and_then(|r| r.get("n"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
