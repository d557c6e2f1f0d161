//! Event repository: append-only event rows.

use rusqlite::{Connection, params};

use crate::errors::BackendError;
use crate::sqlite::row_types::EventRow;

/// Event repository (stateless).
pub struct EventRepo;

impl EventRepo {
    /// Insert an event row and return it as stored.
    ///
    /// `recorded_at` is filled in by the column default.
    pub fn insert(
        conn: &Connection,
        stream_id: &str,
        version: i64,
        idempotency_key: &str,
        payload: &[u8],
    ) -> Result<EventRow, BackendError> {
        let row = conn.query_row(
            "INSERT INTO events (stream_id, version, idempotency_key, payload)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING stream_id, version, recorded_at, payload",
            params![stream_id, version, idempotency_key, payload],
            Self::map_row,
        )?;
        Ok(row)
    }

    /// All events of a stream in ascending version order.
    pub fn list_by_stream(conn: &Connection, stream_id: &str) -> Result<Vec<EventRow>, BackendError> {
        let mut stmt = conn.prepare_cached(
            "SELECT stream_id, version, recorded_at, payload
             FROM events WHERE stream_id = ?1
             ORDER BY version ASC",
        )?;
        let rows = stmt
            .query_map(params![stream_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
        Ok(EventRow {
            stream_id: row.get("stream_id")?,
            version: row.get("version")?,
            recorded_at: row.get("recorded_at")?,
            payload: row.get("payload")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
