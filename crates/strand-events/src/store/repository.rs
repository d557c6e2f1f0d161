//! Async repository port.
//!
//! [`EventsRepository`] is the interface services depend on.
//! [`SqliteEventsRepository`] adapts the blocking [`EventStore`] to it by
//! running each operation on tokio's blocking pool. Dropping a returned
//! future cancels the blocking unit of work: the running statement is
//! interrupted and an open transaction rolls back. A drop that arrives after
//! the commit has nothing left to undo.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::{EventStoreError, Result};
use crate::sqlite::cancel::Cancellation;
use crate::sqlite::connection::ConnectionPool;
use crate::store::event_store::EventStore;
use crate::types::{Event, EventToAdd, Stream, StreamId, StreamToCreate};

/// Storage port for event streams.
#[async_trait]
pub trait EventsRepository: Send + Sync {
    /// Look up a stream; [`EventStoreError::StreamNotFound`] if absent.
    async fn get_stream(&self, stream_id: StreamId) -> Result<Stream>;

    /// Create a stream at version 0.
    async fn create_stream(&self, request: StreamToCreate) -> Result<Stream>;

    /// All events of a stream in ascending version order.
    async fn get_events(&self, stream_id: StreamId) -> Result<Vec<Event>>;

    /// Append one event, guarded by its expected version.
    async fn add_event_to_stream(&self, event: EventToAdd<'_>) -> Result<Event>;
}

/// [`EventsRepository`] over a shared [`EventStore`].
#[derive(Clone)]
pub struct SqliteEventsRepository {
    store: Arc<EventStore>,
}

impl SqliteEventsRepository {
    /// Wrap a shared store.
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// Build a repository over an already-migrated pool.
    pub fn from_pool(pool: ConnectionPool) -> Self {
        Self::new(Arc::new(EventStore::new(pool)))
    }

    /// The underlying blocking store.
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    async fn blocking<T, F>(&self, op: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&EventStore, &Cancellation) -> Result<T> + Send + 'static,
    {
        let cancel = Cancellation::new();
        // Fires if this future is dropped before the task finishes.
        let guard = cancel.cancel_on_drop();
        let store = Arc::clone(&self.store);
        let joined = tokio::task::spawn_blocking(move || work(store.as_ref(), &cancel)).await;
        guard.disarm();
        joined.map_err(|e| {
            warn!(error = %e, op, "blocking store task failed");
            EventStoreError::Internal(format!("{op} task failed: {e}"))
        })?
    }
}

#[async_trait]
impl EventsRepository for SqliteEventsRepository {
    async fn get_stream(&self, stream_id: StreamId) -> Result<Stream> {
        self.blocking("get_stream", move |store, cancel| {
            store.get_stream_cancellable(stream_id, cancel)
        })
        .await
    }

    async fn create_stream(&self, request: StreamToCreate) -> Result<Stream> {
        self.blocking("create_stream", move |store, cancel| {
            store.create_stream_cancellable(&request, cancel)
        })
        .await
    }

    async fn get_events(&self, stream_id: StreamId) -> Result<Vec<Event>> {
        self.blocking("get_events", move |store, cancel| {
            store.get_events_cancellable(stream_id, cancel)
        })
        .await
    }

    async fn add_event_to_stream(&self, event: EventToAdd<'_>) -> Result<Event> {
        // The payload is borrowed; serialize it before leaving this task.
        let payload = event.payload.serialize_payload();
        let EventToAdd {
            stream_id,
            idempotency_key,
            expected_version,
            ..
        } = event;
        self.blocking("add_event_to_stream", move |store, cancel| {
            store.append(stream_id, idempotency_key, expected_version, &payload, cancel)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
