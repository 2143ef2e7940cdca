//! Configuration types.
//!
//! [`Config`] is deserialized from JSON. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ids::IdMode;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.database.pool_size == 0 {
            warnings.push("database.pool_size is 0; a pool of 1 will be used".into());
        }

        if let Some(ref path) = self.database.path {
            if path.as_os_str().is_empty() {
                warnings.push("database.path is empty; an in-memory database will be used".into());
            }
        }

        if self.database.frozen {
            warnings.push(
                "database.frozen is set; saves will not create tables or columns".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` for an in-memory database.
    pub path: Option<PathBuf>,
    pub id_mode: IdMode,
    /// Start frozen: no DDL is issued by saves.
    pub frozen: bool,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            id_mode: IdMode::Integer,
            frozen: false,
            pool_size: 4,
        }
    }
}

impl DatabaseConfig {
    /// Pool size with the zero case clamped to one.
    pub fn effective_pool_size(&self) -> u32 {
        self.pool_size.max(1)
    }

    /// The file path to open, if the database is not in-memory.
    pub fn file_path(&self) -> Option<&Path> {
        self.path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ironbean=info,ib_db=info,ib_core=info".into(),
        }
    }
}
