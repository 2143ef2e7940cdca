//! Type inference: runtime value to portable column type tag.
//!
//! The tag is persisted as the column's declared type. SQLite keeps the
//! declared type verbatim, so on reload [`TypeTag::from_declared`] recovers
//! the tag and [`TypeTag::decode`] converts raw driver values back.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::IdMode;
use crate::value::Value;

/// Portable column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// Stored as integer 0/1.
    Boolean,
    Integer,
    Float,
    Text,
    /// Arrays and objects, stored as JSON text.
    Json,
    /// String of length 36 holding a UUID key.
    Uuid,
}

impl TypeTag {
    /// Tag of a primary or foreign key column under `mode`.
    pub fn key(mode: IdMode) -> Self {
        match mode {
            IdMode::Integer => TypeTag::Integer,
            IdMode::Uuid => TypeTag::Uuid,
        }
    }

    /// Infer the tag of a value. `None` for null, which has no type of its own.
    pub fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(TypeTag::Boolean),
            Value::Int(_) => Some(TypeTag::Integer),
            Value::Float(_) => Some(TypeTag::Float),
            Value::Text(_) => Some(TypeTag::Text),
            Value::Json(_) => Some(TypeTag::Json),
        }
    }

    /// Infer the tag of a value, letting null inherit `previous` or fall back
    /// to text.
    pub fn infer_or(value: &Value, previous: Option<TypeTag>) -> Self {
        Self::infer(value).or(previous).unwrap_or(TypeTag::Text)
    }

    /// Declared SQL type that carries this tag.
    pub fn declared_type(self) -> &'static str {
        match self {
            TypeTag::Boolean => "BOOLEAN",
            TypeTag::Integer => "INTEGER",
            TypeTag::Float => "REAL",
            TypeTag::Text => "TEXT",
            TypeTag::Json => "JSON TEXT",
            TypeTag::Uuid => "VARCHAR(36)",
        }
    }

    /// Recover a tag from a declared SQL type.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared.trim().to_ascii_uppercase().as_str() {
            "BOOLEAN" => Some(TypeTag::Boolean),
            "INTEGER" => Some(TypeTag::Integer),
            "REAL" => Some(TypeTag::Float),
            "TEXT" => Some(TypeTag::Text),
            "JSON TEXT" => Some(TypeTag::Json),
            "VARCHAR(36)" => Some(TypeTag::Uuid),
            _ => None,
        }
    }

    /// Convert a property value into the form written to the backend.
    pub fn encode(value: &Value) -> Value {
        match value {
            Value::Bool(b) => Value::Int(i64::from(*b)),
            Value::Json(j) => Value::Text(j.to_string()),
            other => other.clone(),
        }
    }

    /// Convert a raw backend value read from a column tagged `self`.
    ///
    /// Values that do not fit the tag are returned unchanged.
    pub fn decode(self, raw: Value) -> Value {
        match (self, raw) {
            (TypeTag::Boolean, Value::Int(n)) => Value::Bool(n != 0),
            (TypeTag::Float, Value::Int(n)) => Value::Float(n as f64),
            (TypeTag::Json, Value::Text(s)) => match serde_json::from_str(&s) {
                Ok(j @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                    Value::Json(j)
                }
                _ => Value::Text(s),
            },
            (_, raw) => raw,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Text => "text",
            TypeTag::Json => "json",
            TypeTag::Uuid => "uuid",
        };
        f.write_str(name)
    }
}
