//! Filtered SELECT builder.
//!
//! A [`Query`] collects conditions against one table and renders a
//! parameterized SELECT. Identifiers are validated when the SQL is rendered,
//! so a builder chain never has to be interrupted by `?`.

use ib_core::naming::{check_identifier, check_table};
use ib_core::{Result, Value};

use crate::ddl::quote_identifier;

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(String, Value),
    In(String, Vec<Value>),
    Raw(String, Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// `column = value`. A null value matches `IS NULL`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column.into(), value.into()));
        self
    }

    /// `column IN (values...)`. An empty list matches nothing.
    pub fn is_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(column.into(), values));
        self
    }

    /// A raw SQL condition with `?` placeholders bound to `params`.
    pub fn filter(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.conditions.push(Condition::Raw(sql.into(), params));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push((column.into(), ascending));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    fn where_clause(&self) -> Result<(String, Vec<Value>)> {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for condition in &self.conditions {
            match condition {
                Condition::Eq(column, Value::Null) => {
                    check_identifier(column)?;
                    parts.push(format!("{} IS NULL", quote_identifier(column)));
                }
                Condition::Eq(column, value) => {
                    check_identifier(column)?;
                    parts.push(format!("{} = ?", quote_identifier(column)));
                    params.push(value.clone());
                }
                Condition::In(_, values) if values.is_empty() => parts.push("0".to_string()),
                Condition::In(column, values) => {
                    check_identifier(column)?;
                    parts.push(format!(
                        "{} IN ({})",
                        quote_identifier(column),
                        vec!["?"; values.len()].join(", ")
                    ));
                    params.extend(values.iter().cloned());
                }
                Condition::Raw(sql, values) => {
                    parts.push(format!("({sql})"));
                    params.extend(values.iter().cloned());
                }
            }
        }
        if parts.is_empty() {
            Ok((String::new(), params))
        } else {
            Ok((format!(" WHERE {}", parts.join(" AND ")), params))
        }
    }

    /// Render the SELECT and its parameters.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        check_table(&self.table)?;
        let (conditions, params) = self.where_clause()?;
        let mut sql = format!("SELECT * FROM {}{conditions}", quote_identifier(&self.table));

        if !self.order.is_empty() {
            let mut terms = Vec::with_capacity(self.order.len());
            for (column, ascending) in &self.order {
                check_identifier(column)?;
                terms.push(format!(
                    "{} {}",
                    quote_identifier(column),
                    if *ascending { "ASC" } else { "DESC" }
                ));
            }
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        Ok((sql, params))
    }

    /// Render a `SELECT COUNT(*)` with the same conditions.
    pub fn to_count_sql(&self) -> Result<(String, Vec<Value>)> {
        check_table(&self.table)?;
        let (conditions, params) = self.where_clause()?;
        Ok((
            format!(
                "SELECT COUNT(*) AS n FROM {}{conditions}",
                quote_identifier(&self.table)
            ),
            params,
        ))
    }
}
