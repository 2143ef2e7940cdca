//! Unified error type for ironbean.
//!
//! Every layer funnels its failures into [`Error`]. Backend text is carried
//! verbatim for DDL and DML failures; there is no translation layer.

use std::fmt;

/// Unified error type covering all failure modes of the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The primary key was assigned directly before the first save.
    #[error("Id tamper: the id of a new `{table}` record cannot be assigned directly")]
    IdTamper {
        /// Table of the offending model.
        table: String,
    },

    /// A property or relation key resolved to nothing.
    #[error("Key not found: `{key}` on `{table}`")]
    KeyNotFound {
        /// Table of the model that was accessed.
        table: String,
        /// The key that was looked up.
        key: String,
    },

    /// The record's row is gone: it was trashed, or deleted behind the model.
    #[error("Record not found: `{table}` id {id}")]
    RecordNotFound {
        /// Table of the model.
        table: String,
        /// The id the model carries.
        id: String,
    },

    /// A relation-kind token outside `oto`, `otm`, `mtm` was requested.
    #[error("Invalid relation type: {0}")]
    InvalidRelationType(String),

    /// An `own*List` / `shared*List` key was given elements that are not models.
    #[error("Invalid model list `{key}`: {reason}")]
    InvalidModelList {
        /// The property key that was assigned.
        key: String,
        /// What was wrong with the list.
        reason: String,
    },

    /// The backend rejected a CREATE or ALTER statement.
    #[error("Schema DDL failed on `{table}`: {message}")]
    SchemaDdl {
        /// The table being created or altered.
        table: String,
        /// Backend error text, verbatim.
        message: String,
    },

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A table name or property key is not a usable SQL identifier.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Configuration or caller data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable short code for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::IdTamper { .. } => "id_tamper",
            Error::KeyNotFound { .. } => "key_not_found",
            Error::RecordNotFound { .. } => "record_not_found",
            Error::InvalidRelationType(_) => "invalid_relation_type",
            Error::InvalidModelList { .. } => "invalid_model_list",
            Error::SchemaDdl { .. } => "schema_ddl",
            Error::Database { .. } => "database",
            Error::InvalidIdentifier(_) => "invalid_identifier",
            Error::Validation(_) => "validation",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether the backend reported a column that does not exist.
    ///
    /// This is how a frozen-schema violation surfaces.
    pub fn is_unknown_column(&self) -> bool {
        match self {
            Error::Database { source } => {
                let text = source.to_string();
                text.contains("no such column") || text.contains("has no column named")
            }
            _ => false,
        }
    }

    /// Convenience constructor for [`Error::KeyNotFound`].
    pub fn key_not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Error::KeyNotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidModelList`].
    pub fn invalid_model_list(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidModelList {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::SchemaDdl`].
    pub fn schema_ddl(table: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::SchemaDdl {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
