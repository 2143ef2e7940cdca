//! Additive schema diff.
//!
//! The only difference that is ever acted upon is a column the required
//! schema has and the live table lacks. Existing columns keep their type and
//! nullability, whatever the new data implies: the live type wins.

use crate::schema::{ColumnDef, TableSchema};

/// Columns of `required` that are absent (by name) from `live`.
///
/// The primary key is never part of the diff.
pub fn diff(live: &TableSchema, required: &TableSchema) -> Vec<ColumnDef> {
    required
        .columns
        .iter()
        .filter(|c| !c.primary_key && !live.has_column(&c.name))
        .cloned()
        .collect()
}
