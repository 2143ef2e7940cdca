//! Table shapes: the schema a model requires and the schema a table has.

use std::collections::BTreeMap;

use ib_core::{IdMode, TypeTag};

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Tag recovered from (or encoded into) the declared type. `None` for
    /// columns whose declared type was not written by this engine.
    pub tag: Option<TypeTag>,
    /// Declared SQL type, which echoes the tag for round-tripping.
    pub declared_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    /// A nullable data column of type `tag`.
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag: Some(tag),
            declared_type: tag.declared_type().to_string(),
            nullable: true,
            primary_key: false,
        }
    }

    /// The `id` primary key column under `mode`.
    pub fn primary(mode: IdMode) -> Self {
        Self {
            primary_key: true,
            nullable: false,
            ..Self::new("id", TypeTag::key(mode))
        }
    }

    /// A required `<table>_id` column holding keys of `mode`.
    pub fn key(name: impl Into<String>, mode: IdMode) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, TypeTag::key(mode))
        }
    }

    /// Rebuild a column from introspected metadata.
    pub fn introspected(name: String, declared_type: String, not_null: bool, pk: bool) -> Self {
        Self {
            tag: TypeTag::from_declared(&declared_type),
            name,
            declared_type,
            nullable: !not_null && !pk,
            primary_key: pk,
        }
    }
}

/// A foreign-key constraint: `column` references `table`.`referenced_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub referenced_column: String,
}

impl ForeignKey {
    /// `column` references the `id` of `table`.
    pub fn to_id(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: table.into(),
            referenced_column: "id".into(),
        }
    }
}

/// Shape of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Look up a column by name. SQLite column names are case-insensitive.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// The constraint declared on `column`, if any.
    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.column.eq_ignore_ascii_case(column))
    }

    /// Column names with their tags.
    pub fn tags(&self) -> BTreeMap<String, Option<TypeTag>> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.tag))
            .collect()
    }
}
