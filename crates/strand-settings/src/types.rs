//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every section is `#[serde(default)]`,
//! so a partial file only needs the keys it overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root settings.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/strand/events.db", "poolSize": 32 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandSettings {
    /// Database location and pool tuning.
    pub database: DatabaseSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Database settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file. Relative paths resolve against the strand home
    /// directory.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// How long a pool checkout waits for a free connection, in milliseconds.
    pub connection_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "events.db".to_string(),
            pool_size: 16,
            busy_timeout_ms: 30_000,
            connection_timeout_ms: 5_000,
        }
    }
}

impl DatabaseSettings {
    /// The database path, resolved against `home` when relative.
    pub fn resolve_path(&self, home: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            home.join(path)
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (`RUST_LOG` takes precedence).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
