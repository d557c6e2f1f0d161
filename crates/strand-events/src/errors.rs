//! Error types for the event store.
//!
//! [`EventStoreError`] is the single error type returned by every store
//! operation. Variants fall into four families (see [`ErrorKind`]): not-found,
//! conflict, validation and infrastructure. Infrastructure variants carry the
//! underlying backend failure as their [`source`](std::error::Error::source).

use thiserror::Error;

use crate::types::{IdempotencyKey, StreamId, Version};

/// Boxed cause attached to failures that can originate from several layers.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure reported by the persistence backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// `SQLite` statement or transaction error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error (e.g. checkout timed out).
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl BackendError {
    /// Whether this is a `UNIQUE` or `PRIMARY KEY` constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }
}

/// Coarse classification of an [`EventStoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested resource does not exist.
    NotFound,
    /// Expected-path contention; retry with refreshed state.
    Conflict,
    /// Corrupt persisted data or malformed input.
    Validation,
    /// Backend or transaction failure.
    Infrastructure,
}

/// Errors that can occur during event store operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The requested stream does not exist.
    #[error("stream not found with stream id: {stream_id}")]
    StreamNotFound {
        /// Stream that was looked up.
        stream_id: StreamId,
    },

    /// A stream with the same stream ID or idempotency key already exists.
    #[error("stream already exists (stream id {stream_id}, idempotency key {idempotency_key})")]
    StreamAlreadyExists {
        /// Stream ID of the rejected request.
        stream_id: StreamId,
        /// Idempotency key of the rejected request.
        idempotency_key: IdempotencyKey,
    },

    /// The conditional version bump matched no row: the stream is absent or
    /// its version is not the expected one.
    #[error(
        "could not increment stream version for stream {stream_id} using expected version {expected_version}"
    )]
    VersionIncrementFailure {
        /// Stream the append targeted.
        stream_id: StreamId,
        /// Version the caller expected the stream to be at.
        expected_version: Version,
    },

    /// A stored version is not a valid unsigned 64-bit integer.
    #[error("expected unsigned 64-bit integer as stream version, got {value}")]
    InvalidStreamVersion {
        /// The offending stored value.
        value: i64,
    },

    /// A stored event timestamp is missing or not a finite instant.
    #[error("invalid event timestamp: {value:?}")]
    InvalidEventTimestamp {
        /// The offending stored value, if any.
        value: Option<String>,
    },

    /// A stream identifier is not a UUID.
    #[error("expected UUID stream identifier, got {value:?}")]
    InvalidStreamIdentifier {
        /// The offending text.
        value: String,
    },

    /// The connection pool could not be built.
    #[error("could not open database: {0}")]
    Connection(#[source] BackendError),

    /// The backend could not begin a transaction.
    #[error("could not start transaction: {0}")]
    TransactionStartFailure(#[source] BackendError),

    /// The backend could not commit a transaction.
    #[error("could not commit transaction: {0}")]
    TransactionCommitFailure(#[source] BackendError),

    /// Looking up a stream failed for a reason other than absence.
    #[error("failed to get stream {stream_id}: {source}")]
    StreamFetchFailure {
        /// Stream that was looked up.
        stream_id: StreamId,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// Inserting a stream failed for a reason other than a duplicate.
    #[error("failed to create stream {stream_id}: {source}")]
    StreamCreateFailure {
        /// Stream that was being created.
        stream_id: StreamId,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// Reading the events of a stream failed.
    #[error("could not fetch event stream for stream {stream_id}: {source}")]
    EventStreamFetchFailure {
        /// Stream whose events were requested.
        stream_id: StreamId,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// The event could not be added: the insert, the materialization of the
    /// inserted row, or the surrounding transaction failed.
    #[error("could not add event to stream {stream_id}: {source}")]
    EventInsertFailure {
        /// Stream the append targeted.
        stream_id: StreamId,
        /// Backend, validation or transaction failure.
        #[source]
        source: Cause,
    },

    /// The caller gave up on the operation; any transaction was rolled back.
    #[error("operation cancelled")]
    Cancelled,

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Internal error (e.g. a panicked blocking task).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EventStoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StreamNotFound { .. } => ErrorKind::NotFound,
            Self::StreamAlreadyExists { .. } | Self::VersionIncrementFailure { .. } => {
                ErrorKind::Conflict
            }
            Self::InvalidStreamVersion { .. }
            | Self::InvalidEventTimestamp { .. }
            | Self::InvalidStreamIdentifier { .. } => ErrorKind::Validation,
            Self::Connection(_)
            | Self::TransactionStartFailure(_)
            | Self::TransactionCommitFailure(_)
            | Self::StreamFetchFailure { .. }
            | Self::StreamCreateFailure { .. }
            | Self::EventStreamFetchFailure { .. }
            | Self::EventInsertFailure { .. }
            | Self::Cancelled
            | Self::Migration { .. }
            | Self::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether retrying the operation (after refreshing state for conflicts)
    /// can succeed without fixing input or data.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::Conflict => true,
            ErrorKind::Infrastructure => !matches!(self, Self::Migration { .. }),
            ErrorKind::NotFound | ErrorKind::Validation => false,
        }
    }
}

/// Convenience type alias for event store results.
pub type Result<T> = std::result::Result<T, EventStoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
