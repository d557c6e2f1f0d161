//! Event model.
//!
//! An [`Event`] is only ever built from a stored row, and only if the row
//! holds a non-negative version, a finite recorded timestamp and a UUID
//! stream ID. Anything else is a corrupt row and is rejected.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::errors::{EventStoreError, Result};
use crate::sqlite::row_types::EventRow;
use crate::types::{IdempotencyKey, Payload, StreamId, Version};

/// Request to append one event to a stream.
#[derive(Clone, Copy)]
pub struct EventToAdd<'a> {
    /// Target stream.
    pub stream_id: StreamId,
    /// Deduplicates retried appends of this event.
    pub idempotency_key: IdempotencyKey,
    /// Version the caller believes the stream is at.
    pub expected_version: Version,
    /// Domain payload, serialized by the caller's [`Payload`] impl.
    pub payload: &'a dyn Payload,
}

impl std::fmt::Debug for EventToAdd<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventToAdd")
            .field("stream_id", &self.stream_id)
            .field("idempotency_key", &self.idempotency_key)
            .field("expected_version", &self.expected_version)
            .finish_non_exhaustive()
    }
}

/// Immutable, committed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    stream_id: StreamId,
    version: Version,
    recorded_at: DateTime<Utc>,
    payload: Vec<u8>,
}

impl Event {
    /// Owning stream.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Position of the event in its stream, starting at 1.
    pub fn version(&self) -> Version {
        self.version
    }

    /// When the backend recorded the event.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Opaque payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode a JSON payload.
    pub fn payload_json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.payload)
    }

    pub(crate) fn from_row(row: EventRow) -> Result<Self> {
        let version = Version::try_from_stored(row.version)?;
        let recorded_at = parse_recorded_at(row.recorded_at)?;
        Ok(Self {
            stream_id: StreamId::parse(&row.stream_id)?,
            version,
            recorded_at,
            payload: row.payload,
        })
    }
}

fn parse_recorded_at(raw: Option<String>) -> Result<DateTime<Utc>> {
    let Some(raw) = raw else {
        return Err(EventStoreError::InvalidEventTimestamp { value: None });
    };
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => Err(EventStoreError::InvalidEventTimestamp { value: Some(raw) }),
    }
}
