//! Shared harness: a fresh, migrated, file-backed database per test.

#![allow(dead_code, missing_docs)]

use std::sync::Arc;

use serde_json::json;
use strand_events::sqlite::connection::PooledConnection;
use strand_events::{
    ConnectionConfig, Event, EventStore, EventToAdd, IdempotencyKey, Result, SqliteEventsRepository,
    Stream, StreamId, StreamToCreate, Version,
};
use tempfile::TempDir;

pub struct TestEnvironment {
    _dir: TempDir,
    pub store: Arc<EventStore>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let pool = strand_events::new_file(path.to_str().unwrap(), &ConnectionConfig::default())
            .unwrap();
        let _ = strand_events::run_migrations(&pool.get().unwrap()).unwrap();
        Self {
            _dir: dir,
            store: Arc::new(EventStore::new(pool)),
        }
    }

    pub fn repository(&self) -> SqliteEventsRepository {
        SqliteEventsRepository::new(Arc::clone(&self.store))
    }

    /// Raw connection for planting rows the store would never write.
    pub fn raw(&self) -> PooledConnection {
        self.store.pool().get().unwrap()
    }

    pub fn create_stream(&self) -> Stream {
        self.store.create_stream(&StreamToCreate::generate()).unwrap()
    }

    pub fn append(&self, stream_id: StreamId, expected: u64) -> Result<Event> {
        append_to(&self.store, stream_id, expected)
    }
}

pub fn append_to(store: &EventStore, stream_id: StreamId, expected: u64) -> Result<Event> {
    store.add_event_to_stream(&EventToAdd {
        stream_id,
        idempotency_key: IdempotencyKey::new_v7(),
        expected_version: Version::new(expected),
        payload: &json!({ "expected": expected }),
    })
}
