//! Stream identity model.

use serde::Serialize;

use crate::errors::Result;
use crate::sqlite::row_types::StreamRow;
use crate::types::{IdempotencyKey, StreamId, Version};

/// Request to create a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamToCreate {
    /// Identity of the new stream.
    pub stream_id: StreamId,
    /// Deduplicates repeated creation requests.
    pub idempotency_key: IdempotencyKey,
}

impl StreamToCreate {
    /// Request a stream with freshly generated identifiers.
    pub fn generate() -> Self {
        Self {
            stream_id: StreamId::new_v7(),
            idempotency_key: IdempotencyKey::new_v7(),
        }
    }
}

/// Read-only snapshot of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    stream_id: StreamId,
    idempotency_key: IdempotencyKey,
    latest_version: Version,
}

impl Stream {
    /// Stream identity.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Key the stream was created with.
    pub fn idempotency_key(&self) -> IdempotencyKey {
        self.idempotency_key
    }

    /// Version of the last committed event (0 if none).
    pub fn latest_version(&self) -> Version {
        self.latest_version
    }

    /// Validate a stored row. A negative version means the row is corrupt.
    pub(crate) fn from_row(row: StreamRow) -> Result<Self> {
        let latest_version = Version::try_from_stored(row.latest_version)?;
        Ok(Self {
            stream_id: StreamId::parse(&row.stream_id)?,
            idempotency_key: IdempotencyKey::parse(&row.idempotency_key)?,
            latest_version,
        })
    }
}
