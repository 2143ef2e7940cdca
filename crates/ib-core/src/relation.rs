//! Relation classification.
//!
//! A property assignment is classified once, when it happens, from the key's
//! spelling and the shape of the assigned value. The result is a closed
//! [`RelationKind`] that the writer and resolver act on.

use std::fmt;

use crate::error::{Error, Result};
use crate::naming::split_words;
use crate::value::Value;

/// What a property key refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// A column of the model's own table.
    Plain,
    /// One foreign model, referenced through `<table>_id` on the owner.
    Singular(String),
    /// Foreign models that carry `<owner>_id` back-references.
    OwnedList(String),
    /// Foreign models linked through a junction table.
    SharedList(String),
}

impl RelationKind {
    /// Short token for the relation kind: `oto`, `otm` or `mtm`.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            RelationKind::Plain => None,
            RelationKind::Singular(_) => Some("oto"),
            RelationKind::OwnedList(_) => Some("otm"),
            RelationKind::SharedList(_) => Some("mtm"),
        }
    }

    /// Build a relation kind from its token and foreign table.
    pub fn from_token(token: &str, table: impl Into<String>) -> Result<Self> {
        match token {
            "oto" => Ok(RelationKind::Singular(table.into())),
            "otm" => Ok(RelationKind::OwnedList(table.into())),
            "mtm" => Ok(RelationKind::SharedList(table.into())),
            other => Err(Error::InvalidRelationType(other.to_string())),
        }
    }

    /// The foreign table, if this is a relation.
    pub fn foreign_table(&self) -> Option<&str> {
        match self {
            RelationKind::Plain => None,
            RelationKind::Singular(t) | RelationKind::OwnedList(t) | RelationKind::SharedList(t) => {
                Some(t.as_str())
            }
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.token(), self.foreign_table()) {
            (Some(token), Some(table)) => write!(f, "{token}({table})"),
            _ => f.write_str("plain"),
        }
    }
}

/// Runtime shape of an assigned value, as far as classification cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape<'a> {
    /// A scalar, an object, or null.
    Scalar,
    /// A single model of the given table.
    Model(&'a str),
    /// A list: tables of its model elements and the number of other elements.
    List { tables: Vec<&'a str>, others: usize },
}

impl<'a> Shape<'a> {
    /// Shape of a plain value. JSON arrays count as lists of non-models.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Json(serde_json::Value::Array(items)) => Shape::List {
                tables: Vec::new(),
                others: items.len(),
            },
            _ => Shape::Scalar,
        }
    }
}

/// Which list convention a key follows, with the foreign table it names.
fn list_pattern(key: &str) -> Option<(bool, String)> {
    let parts = split_words(key);
    if parts.len() < 3 || !parts[parts.len() - 1].eq_ignore_ascii_case("list") {
        return None;
    }
    let owned = if parts[0].eq_ignore_ascii_case("own") {
        true
    } else if parts[0].eq_ignore_ascii_case("shared") {
        false
    } else {
        return None;
    };
    let table = parts[1..parts.len() - 1]
        .iter()
        .map(|p| p.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    Some((owned, table))
}

/// Classify a property assignment.
///
/// A single model is always [`RelationKind::Singular`]. A list under an
/// `own<Type>List` / `shared<Type>List` key must hold only models of `<type>`;
/// a list of models under any other key is rejected. Everything else is
/// [`RelationKind::Plain`].
pub fn classify(key: &str, shape: &Shape<'_>) -> Result<RelationKind> {
    match shape {
        Shape::Model(table) => Ok(RelationKind::Singular((*table).to_string())),
        Shape::List { tables, others } => match list_pattern(key) {
            Some((owned, foreign)) => {
                if *others > 0 {
                    return Err(Error::invalid_model_list(
                        key,
                        format!("{others} element(s) are not models"),
                    ));
                }
                if let Some(bad) = tables.iter().find(|t| **t != foreign) {
                    return Err(Error::invalid_model_list(
                        key,
                        format!("expected `{foreign}` models, found `{bad}`"),
                    ));
                }
                if owned {
                    Ok(RelationKind::OwnedList(foreign))
                } else {
                    Ok(RelationKind::SharedList(foreign))
                }
            }
            None if !tables.is_empty() => Err(Error::invalid_model_list(
                key,
                "a list of models needs an own<Type>List or shared<Type>List key",
            )),
            None => Ok(RelationKind::Plain),
        },
        Shape::Scalar => Ok(RelationKind::Plain),
    }
}

/// How a key would be looked up on read, from its spelling alone.
///
/// Returns the list convention and foreign table for `own`/`shared` keys.
pub fn list_key(key: &str) -> Option<RelationKind> {
    list_pattern(key).map(|(owned, table)| {
        if owned {
            RelationKind::OwnedList(table)
        } else {
            RelationKind::SharedList(table)
        }
    })
}
