//! Stream repository: stream rows and their version counter.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::BackendError;
use crate::sqlite::row_types::StreamRow;

/// Stream repository (stateless).
pub struct StreamRepo;

impl StreamRepo {
    /// Fetch a stream row by ID.
    pub fn get(conn: &Connection, stream_id: &str) -> Result<Option<StreamRow>, BackendError> {
        let row = conn
            .query_row(
                "SELECT stream_id, idempotency_key, latest_version
                 FROM streams WHERE stream_id = ?1",
                params![stream_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a stream at version 0 and return the stored row.
    ///
    /// A duplicate stream ID or idempotency key surfaces as a unique
    /// violation (see [`BackendError::is_unique_violation`]).
    pub fn insert(
        conn: &Connection,
        stream_id: &str,
        idempotency_key: &str,
    ) -> Result<StreamRow, BackendError> {
        let row = conn.query_row(
            "INSERT INTO streams (stream_id, idempotency_key, latest_version)
             VALUES (?1, ?2, 0)
             RETURNING stream_id, idempotency_key, latest_version",
            params![stream_id, idempotency_key],
            Self::map_row,
        )?;
        Ok(row)
    }

    /// Conditionally bump the version from `expected` to `expected + 1`.
    ///
    /// Returns the new version, or `None` if the stream does not exist or is
    /// not at `expected`.
    pub fn increment_version(
        conn: &Connection,
        stream_id: &str,
        expected: i64,
    ) -> Result<Option<i64>, BackendError> {
        let version = conn
            .query_row(
                "UPDATE streams SET latest_version = latest_version + 1
                 WHERE stream_id = ?1 AND latest_version = ?2
                 RETURNING latest_version",
                params![stream_id, expected],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreamRow> {
        Ok(StreamRow {
            stream_id: row.get("stream_id")?,
            idempotency_key: row.get("idempotency_key")?,
            latest_version: row.get("latest_version")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
