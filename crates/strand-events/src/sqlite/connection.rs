//! `SQLite` connection pool with WAL mode and foreign keys enabled.
//!
//! Uses `r2d2` connection pooling with the `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on each new connection so every connection
//! shares the same journal mode, busy timeout and foreign-key enforcement.
//!
//! The busy timeout is what makes concurrent writers queue on the database
//! lock instead of failing with `SQLITE_BUSY`.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::{BackendError, EventStoreError, Result};

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 16).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 30000).
    pub busy_timeout_ms: u32,
    /// How long a checkout waits for a free connection (default: 5000).
    pub connection_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            busy_timeout_ms: 30_000,
            connection_timeout_ms: 5_000,
        }
    }
}

/// `SQLite` pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};\
             PRAGMA journal_mode = WAL;\
             PRAGMA foreign_keys = ON;\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

fn build(
    manager: SqliteConnectionManager,
    pool_size: u32,
    config: &ConnectionConfig,
) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(|e| EventStoreError::Connection(BackendError::Pool(e)))?;
    Ok(pool)
}

/// Create an in-memory connection pool (for testing).
///
/// Every in-memory connection is its own database, so the pool is capped at
/// a single connection regardless of `pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::memory(), 1, config)
}

/// Create a file-backed connection pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::file(path), config.pool_size, config)
}

/// Verify pragmas are set correctly on a connection.
pub fn verify_pragmas(conn: &Connection) -> Result<PragmaState> {
    let read = |sql: &str| -> std::result::Result<String, rusqlite::Error> {
        conn.query_row(sql, [], |row| row.get::<_, rusqlite::types::Value>(0))
            .map(|v| match v {
                rusqlite::types::Value::Text(s) => s,
                rusqlite::types::Value::Integer(i) => i.to_string(),
                other => format!("{other:?}"),
            })
    };
    let journal_mode = read("PRAGMA journal_mode").map_err(pragma_error)?;
    let foreign_keys = read("PRAGMA foreign_keys").map_err(pragma_error)?;
    let busy_timeout = read("PRAGMA busy_timeout").map_err(pragma_error)?;
    Ok(PragmaState {
        journal_mode,
        foreign_keys_enabled: foreign_keys == "1",
        busy_timeout_ms: busy_timeout.parse().unwrap_or(0),
    })
}

fn pragma_error(e: rusqlite::Error) -> EventStoreError {
    EventStoreError::Internal(format!("failed to read pragma: {e}"))
}

/// Pragma state for verification.
#[derive(Debug)]
pub struct PragmaState {
    /// Journal mode (should be "wal", or "memory" for in-memory databases).
    pub journal_mode: String,
    /// Whether foreign keys are enabled.
    pub foreign_keys_enabled: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_creates_successfully() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        let pragmas = verify_pragmas(&conn).unwrap();
        assert!(
            pragmas.journal_mode == "wal" || pragmas.journal_mode == "memory",
            "journal_mode should be wal or memory, got: {}",
            pragmas.journal_mode
        );
        assert!(pragmas.foreign_keys_enabled);
    }

    #[test]
    fn in_memory_pool_is_single_connection() {
        let config = ConnectionConfig {
            pool_size: 8,
            ..Default::default()
        };
        let pool = new_in_memory(&config).unwrap();
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn file_pool_creates_successfully() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = new_file(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        let pragmas = verify_pragmas(&conn).unwrap();
        assert_eq!(pragmas.journal_mode, "wal");
        assert!(pragmas.foreign_keys_enabled);
        assert_eq!(pragmas.busy_timeout_ms, 30_000);
    }

    #[test]
    fn custom_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let config = ConnectionConfig {
            pool_size: 2,
            busy_timeout_ms: 1_000,
            connection_timeout_ms: 250,
        };
        let pool = new_file(path.to_str().unwrap(), &config).unwrap();
        assert_eq!(pool.max_size(), 2);
        let conn = pool.get().unwrap();
        assert_eq!(verify_pragmas(&conn).unwrap().busy_timeout_ms, 1_000);
    }

    #[test]
    fn checkout_times_out_when_exhausted() {
        let config = ConnectionConfig {
            connection_timeout_ms: 50,
            ..Default::default()
        };
        let pool = new_in_memory(&config).unwrap();
        let _held = pool.get().unwrap();
        assert!(pool.get().is_err());
    }

    #[test]
    fn default_config_values() {
        let config = ConnectionConfig::default();
        assert_eq!(config.pool_size, 16);
        assert_eq!(config.busy_timeout_ms, 30_000);
        assert_eq!(config.connection_timeout_ms, 5_000);
    }
}
