//! Record identifiers.
//!
//! A database instance hands out either auto-increment integers or random v4
//! UUIDs, never both. [`IdMode`] picks which; [`RecordId`] carries the value.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::value::Value;

/// How a database instance generates primary keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    /// `INTEGER PRIMARY KEY` assigned by the backend.
    #[default]
    Integer,
    /// `VARCHAR(36)` primary key holding a v4 UUID generated by the writer.
    Uuid,
}

impl IdMode {
    /// Placeholder used to seed foreign-key columns of junction tables so
    /// type inference picks the key representation.
    pub fn placeholder(self) -> Value {
        match self {
            IdMode::Integer => Value::Int(0),
            IdMode::Uuid => Value::Text(String::new()),
        }
    }
}

/// Primary key of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Auto-increment key.
    Int(i64),
    /// UUID key.
    Uuid(Uuid),
}

impl RecordId {
    /// Generate a fresh id for `mode`, or `None` when the backend assigns it.
    pub fn generate(mode: IdMode) -> Option<Self> {
        match mode {
            IdMode::Integer => None,
            IdMode::Uuid => Some(RecordId::Uuid(Uuid::new_v4())),
        }
    }

    /// Interpret a raw column value as an id.
    ///
    /// Integers map to [`RecordId::Int`]; text that parses as a UUID maps to
    /// [`RecordId::Uuid`]; numeric text maps to [`RecordId::Int`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(RecordId::Int(*n)),
            Value::Text(s) => Uuid::parse_str(s)
                .map(RecordId::Uuid)
                .ok()
                .or_else(|| s.parse().ok().map(RecordId::Int)),
            _ => None,
        }
    }

    /// The value written to an id or foreign-key column.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::Int(*n),
            RecordId::Uuid(u) => Value::Text(u.to_string()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        RecordId::Uuid(uuid)
    }
}
