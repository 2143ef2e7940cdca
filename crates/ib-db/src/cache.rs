//! Per-database cache of introspected table schemas.
//!
//! Read-through: populated on first introspection of a table and refreshed
//! after every schema change the engine makes. DDL applied by anyone else is
//! only seen after [`SchemaCache::invalidate`] or [`SchemaCache::clear`].

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::schema::TableSchema;

#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, TableSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<TableSchema> {
        let hit = self.tables.read().get(table).cloned();
        if hit.is_some() {
            tracing::trace!(table, "schema cache hit");
        }
        hit
    }

    pub fn put(&self, schema: TableSchema) {
        self.tables.write().insert(schema.name.clone(), schema);
    }

    /// Drop the entry for `table`; the next lookup re-introspects.
    pub fn invalidate(&self, table: &str) {
        self.tables.write().remove(table);
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
