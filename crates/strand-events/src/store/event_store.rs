//! Synchronous `EventStore` API over the `SQLite` backend.
//!
//! Writes run in `BEGIN IMMEDIATE` transactions through
//! [`run_in_transaction`], so each `create_stream` and `add_event_to_stream`
//! either commits whole or leaves no trace. Optimistic concurrency is left to
//! the database: a conditional version bump decides the single winner among
//! concurrent appends, and uniqueness constraints decide creation races.
//!
//! The async port drives the `*_cancellable` variants. A fired
//! [`Cancellation`] interrupts the running statement, and a write then rolls
//! back with [`EventStoreError::Cancelled`].

use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::errors::{BackendError, Cause, EventStoreError, Result};
use crate::sqlite::cancel::Cancellation;
use crate::sqlite::connection::ConnectionPool;
use crate::sqlite::repositories::event::EventRepo;
use crate::sqlite::repositories::stream::StreamRepo;
use crate::sqlite::transaction::{TransactionMode, run_in_transaction};
use crate::types::{Event, EventToAdd, IdempotencyKey, Stream, StreamId, StreamToCreate, Version};

/// Event store backed by a pooled `SQLite` database.
///
/// Cheap to share behind an `Arc`; every operation checks out its own
/// connection and owns its transaction end to end.
pub struct EventStore {
    pool: ConnectionPool,
}

impl EventStore {
    /// Create a store over an already-migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ─────────────────────────────────────────────────────────────────────
    // Streams
    // ─────────────────────────────────────────────────────────────────────

    /// Look up a stream.
    ///
    /// Fails with [`EventStoreError::StreamNotFound`] if it does not exist.
    pub fn get_stream(&self, stream_id: StreamId) -> Result<Stream> {
        self.get_stream_cancellable(stream_id, &Cancellation::new())
    }

    #[instrument(skip(self, cancel), fields(stream_id = %stream_id))]
    pub(crate) fn get_stream_cancellable(
        &self,
        stream_id: StreamId,
        cancel: &Cancellation,
    ) -> Result<Stream> {
        let fetch_failure = |source: BackendError| {
            if cancel.is_cancelled() {
                return EventStoreError::Cancelled;
            }
            warn!(error = %source, "stream fetch failed");
            EventStoreError::StreamFetchFailure { stream_id, source }
        };

        cancel.check()?;
        let conn = self.pool.get().map_err(|e| fetch_failure(e.into()))?;
        let attached = cancel.attach(&conn)?;
        let row = StreamRepo::get(&conn, &stream_id.to_string())
            .map_err(fetch_failure)?
            .ok_or(EventStoreError::StreamNotFound { stream_id })?;
        drop(attached);
        Stream::from_row(row)
    }

    /// Create a stream at version 0.
    ///
    /// A duplicate stream ID or idempotency key fails with
    /// [`EventStoreError::StreamAlreadyExists`]; the database constraint
    /// picks exactly one winner among concurrent creators.
    pub fn create_stream(&self, request: &StreamToCreate) -> Result<Stream> {
        self.create_stream_cancellable(request, &Cancellation::new())
    }

    #[instrument(
        skip(self, request, cancel),
        fields(stream_id = %request.stream_id, idempotency_key = %request.idempotency_key)
    )]
    pub(crate) fn create_stream_cancellable(
        &self,
        request: &StreamToCreate,
        cancel: &Cancellation,
    ) -> Result<Stream> {
        let StreamToCreate {
            stream_id,
            idempotency_key,
        } = *request;

        let result = run_in_transaction(&self.pool, TransactionMode::Immediate, cancel, |tx| {
            let row = StreamRepo::insert(tx, &stream_id.to_string(), &idempotency_key.to_string())
                .map_err(|source| {
                    if source.is_unique_violation() {
                        EventStoreError::StreamAlreadyExists {
                            stream_id,
                            idempotency_key,
                        }
                    } else {
                        EventStoreError::StreamCreateFailure { stream_id, source }
                    }
                })?;
            Stream::from_row(row)
        });

        let outcome = match &result {
            Ok(_) => "created",
            Err(EventStoreError::StreamAlreadyExists { .. }) => {
                debug!("stream already exists");
                "conflict"
            }
            Err(EventStoreError::Cancelled) => {
                debug!("stream creation cancelled");
                "cancelled"
            }
            Err(e) => {
                warn!(error = %e, "stream creation failed");
                "failed"
            }
        };
        counter!("strand_streams_created_total", "outcome" => outcome).increment(1);
        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────

    /// All events of a stream in ascending version order.
    ///
    /// An unknown stream yields an empty list. A corrupt row aborts the
    /// whole fetch with the matching validation error.
    pub fn get_events(&self, stream_id: StreamId) -> Result<Vec<Event>> {
        self.get_events_cancellable(stream_id, &Cancellation::new())
    }

    #[instrument(skip(self, cancel), fields(stream_id = %stream_id))]
    pub(crate) fn get_events_cancellable(
        &self,
        stream_id: StreamId,
        cancel: &Cancellation,
    ) -> Result<Vec<Event>> {
        let fetch_failure = |source: BackendError| {
            if cancel.is_cancelled() {
                return EventStoreError::Cancelled;
            }
            warn!(error = %source, "event stream fetch failed");
            EventStoreError::EventStreamFetchFailure { stream_id, source }
        };

        cancel.check()?;
        let conn = self.pool.get().map_err(|e| fetch_failure(e.into()))?;
        let attached = cancel.attach(&conn)?;
        let rows = EventRepo::list_by_stream(&conn, &stream_id.to_string()).map_err(fetch_failure)?;
        drop(attached);
        rows.into_iter()
            .map(Event::from_row)
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| warn!(error = %e, "corrupt event row"))
    }

    /// Append one event at `expected_version + 1`.
    ///
    /// Fails with [`EventStoreError::VersionIncrementFailure`] if the stream
    /// does not exist or is not at `expected_version`. Reusing an idempotency
    /// key already appended to this stream fails with
    /// [`EventStoreError::EventInsertFailure`] whose source is the unique
    /// violation. In both cases nothing is written.
    pub fn add_event_to_stream(&self, event: &EventToAdd<'_>) -> Result<Event> {
        let payload = event.payload.serialize_payload();
        self.append(
            event.stream_id,
            event.idempotency_key,
            event.expected_version,
            &payload,
            &Cancellation::new(),
        )
    }

    /// Append with an already-serialized payload.
    #[instrument(
        skip(self, payload, cancel),
        fields(
            stream_id = %stream_id,
            expected_version = %expected_version,
            payload_len = payload.len()
        )
    )]
    pub(crate) fn append(
        &self,
        stream_id: StreamId,
        idempotency_key: IdempotencyKey,
        expected_version: Version,
        payload: &[u8],
        cancel: &Cancellation,
    ) -> Result<Event> {
        let insert_failure =
            |source: Cause| EventStoreError::EventInsertFailure { stream_id, source };

        let result = run_in_transaction(&self.pool, TransactionMode::Immediate, cancel, |tx| {
            let stream_key = stream_id.to_string();

            // A version beyond the stored range can never match.
            let bumped = match expected_version.to_stored() {
                Some(expected) => StreamRepo::increment_version(tx, &stream_key, expected)
                    .map_err(|e| insert_failure(Box::new(e)))?,
                None => None,
            };
            let version = bumped.ok_or(EventStoreError::VersionIncrementFailure {
                stream_id,
                expected_version,
            })?;

            let row = EventRepo::insert(
                tx,
                &stream_key,
                version,
                &idempotency_key.to_string(),
                payload,
            )
            .map_err(|source| insert_failure(Box::new(source)))?;

            Event::from_row(row).map_err(|e| insert_failure(Box::new(e)))
        })
        .map_err(|e| match e {
            EventStoreError::TransactionStartFailure(_)
            | EventStoreError::TransactionCommitFailure(_) => insert_failure(Box::new(e)),
            other => other,
        });

        let outcome = match &result {
            Ok(event) => {
                debug!(version = %event.version(), "event appended");
                "committed"
            }
            Err(EventStoreError::VersionIncrementFailure { .. }) => {
                debug!("stale or unknown stream version");
                "conflict"
            }
            Err(EventStoreError::Cancelled) => {
                debug!("append cancelled");
                "cancelled"
            }
            Err(e) => {
                warn!(error = %e, "event append failed");
                "failed"
            }
        };
        counter!("strand_appends_total", "outcome" => outcome).increment(1);
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
