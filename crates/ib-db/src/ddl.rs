//! SQLite DDL generation.
//!
//! Only two statement shapes exist: CREATE TABLE for a table that is absent
//! and ALTER TABLE ... ADD COLUMN for a column that is missing.

use crate::schema::{ColumnDef, ForeignKey, TableSchema};

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_sql(column: &ColumnDef) -> String {
    let mut sql = format!("{} {}", quote_identifier(&column.name), column.declared_type);
    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
        if column.declared_type.eq_ignore_ascii_case("INTEGER") {
            sql.push_str(" AUTOINCREMENT");
        } else {
            sql.push_str(" NOT NULL");
        }
    } else if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    sql
}

fn references_sql(fk: &ForeignKey) -> String {
    format!(
        "REFERENCES {}({})",
        quote_identifier(&fk.table),
        quote_identifier(&fk.referenced_column)
    )
}

/// `CREATE TABLE` for the full schema, primary key first.
pub fn create_table(schema: &TableSchema) -> String {
    let mut parts: Vec<String> = schema
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .chain(schema.columns.iter().filter(|c| !c.primary_key))
        .map(column_sql)
        .collect();

    for fk in &schema.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) {}",
            quote_identifier(&fk.column),
            references_sql(fk)
        ));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_identifier(&schema.name),
        parts.join(",\n    ")
    )
}

/// `ALTER TABLE ... ADD COLUMN`.
///
/// SQLite only accepts added columns that may be NULL, so the column is added
/// as nullable whatever `column.nullable` says; a foreign key becomes an
/// inline `REFERENCES` clause.
pub fn add_column(table: &str, column: &ColumnDef, fk: Option<&ForeignKey>) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_identifier(table),
        quote_identifier(&column.name),
        column.declared_type
    );
    if let Some(fk) = fk {
        sql.push(' ');
        sql.push_str(&references_sql(fk));
    }
    sql
}
