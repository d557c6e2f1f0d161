//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These are the raw stored shapes. Validation into [`Stream`] and [`Event`]
//! happens in the domain types.
//!
//! [`Stream`]: crate::types::Stream
//! [`Event`]: crate::types::Event

/// Raw row from the `streams` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRow {
    /// Stream ID (hyphenated UUID text).
    pub stream_id: String,
    /// Idempotency key (hyphenated UUID text).
    pub idempotency_key: String,
    /// Latest committed version.
    pub latest_version: i64,
}

/// Raw row from the `events` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRow {
    /// Owning stream ID.
    pub stream_id: String,
    /// Version within the stream.
    pub version: i64,
    /// RFC 3339 timestamp, if present.
    pub recorded_at: Option<String>,
    /// Opaque payload.
    pub payload: Vec<u8>,
}
