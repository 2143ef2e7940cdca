//! Schema materialization.
//!
//! [`TableManager`] is the single path through which tables are created or
//! widened. It builds the schema a model requires, compares it with the live
//! table and issues CREATE TABLE or ADD COLUMN. While the database is frozen
//! the mutation path is skipped entirely.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ib_core::model::is_id_key;
use ib_core::{Error, IdMode, Model, Result, TypeTag};

use crate::cache::SchemaCache;
use crate::conn::SqlConnection;
use crate::ddl;
use crate::diff::diff;
use crate::schema::{ColumnDef, ForeignKey, TableSchema};

pub struct TableManager {
    cache: Arc<SchemaCache>,
    id_mode: IdMode,
    frozen: AtomicBool,
}

/// Backend DDL failures become [`Error::SchemaDdl`] carrying the backend text.
fn ddl_error(table: &str, err: Error) -> Error {
    match err {
        Error::Database { source } => Error::schema_ddl(table, source),
        other => other,
    }
}

impl TableManager {
    pub fn new(cache: Arc<SchemaCache>, id_mode: IdMode, frozen: bool) -> Self {
        Self {
            cache,
            id_mode,
            frozen: AtomicBool::new(frozen),
        }
    }

    pub fn id_mode(&self) -> IdMode {
        self.id_mode
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    pub fn set_frozen(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::SeqCst);
        tracing::info!(frozen, "schema freeze changed");
    }

    /// The live schema of `table`, through the cache.
    pub fn live(&self, conn: &dyn SqlConnection, table: &str) -> Result<Option<TableSchema>> {
        if let Some(schema) = self.cache.get(table) {
            return Ok(Some(schema));
        }
        let schema = conn.introspect_table(table)?;
        if let Some(ref s) = schema {
            self.cache.put(s.clone());
        }
        Ok(schema)
    }

    /// Whether `table` exists. A missing table is `false`, not an error.
    pub fn table_exists(&self, conn: &dyn SqlConnection, table: &str) -> Result<bool> {
        Ok(self.live(conn, table)?.is_some())
    }

    /// Live columns of `table` and their tags; empty if the table is absent.
    pub fn columns(
        &self,
        conn: &dyn SqlConnection,
        table: &str,
    ) -> Result<BTreeMap<String, Option<TypeTag>>> {
        Ok(self
            .live(conn, table)?
            .map(|schema| schema.tags())
            .unwrap_or_default())
    }

    pub fn tables(&self, conn: &dyn SqlConnection) -> Result<Vec<String>> {
        conn.list_tables()
    }

    /// The schema `model` requires: its own properties, the primary key and
    /// the foreign keys supplied for relationship cascades.
    ///
    /// `id` is always the primary key. Any other `*_id` column is a required
    /// key column typed like the database's ids.
    pub fn build_schema(&self, model: &Model, foreign_keys: &[ForeignKey]) -> TableSchema {
        let mut schema = TableSchema::new(model.table());
        schema.columns.push(ColumnDef::primary(self.id_mode));

        for (name, tag) in model.types() {
            if is_id_key(&name) {
                continue;
            }
            if name.ends_with("_id") {
                schema.columns.push(ColumnDef::key(name, self.id_mode));
            } else {
                schema.columns.push(ColumnDef::new(name, tag));
            }
        }

        for fk in foreign_keys {
            if !schema.has_column(&fk.column) {
                schema.columns.push(ColumnDef::key(fk.column.clone(), self.id_mode));
            }
            schema.foreign_keys.push(fk.clone());
        }
        schema
    }

    /// Create `required` if its table is absent, otherwise add the columns it
    /// lacks. Returns the resulting live schema.
    pub fn save_or_update_table(
        &self,
        conn: &dyn SqlConnection,
        required: &TableSchema,
    ) -> Result<TableSchema> {
        let table = required.name.as_str();
        match self.live(conn, table)? {
            None => {
                let sql = ddl::create_table(required);
                conn.execute_statement(&sql, &[])
                    .map_err(|e| ddl_error(table, e))?;
                tracing::info!(table, columns = required.columns.len(), "Created table");
            }
            Some(live) => {
                let missing = diff(&live, required);
                if missing.is_empty() {
                    return Ok(live);
                }
                for column in &missing {
                    let sql = ddl::add_column(table, column, required.foreign_key_for(&column.name));
                    conn.execute_statement(&sql, &[])
                        .map_err(|e| ddl_error(table, e))?;
                }
                tracing::info!(
                    table,
                    added = ?missing.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                    "Added columns"
                );
            }
        }

        self.cache.invalidate(table);
        self.live(conn, table)?
            .ok_or_else(|| Error::Internal(format!("table `{table}` missing after DDL")))
    }

    /// Reconcile the table of `model` with its properties, unless frozen.
    pub fn ensure(
        &self,
        conn: &dyn SqlConnection,
        model: &Model,
        foreign_keys: &[ForeignKey],
    ) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        let required = self.build_schema(model, foreign_keys);
        self.save_or_update_table(conn, &required)?;
        Ok(())
    }
}
