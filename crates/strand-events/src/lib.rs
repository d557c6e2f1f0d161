//! # strand-events
//!
//! Append-only event store with optimistic concurrency on a `SQLite` backend.
//!
//! - **Streams**: identified by a UUID, deduplicated by an idempotency key,
//!   carrying a version counter that starts at 0
//! - **Events**: immutable, opaque payloads appended at `expected_version + 1`;
//!   exactly one of several concurrent appends with the same expected version wins
//! - **`SQLite` backend**: pooled `rusqlite` connections, repository pattern,
//!   `BEGIN IMMEDIATE` write transactions and version-tracked migrations
//! - **Async port**: [`EventsRepository`] for tokio services

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;
pub mod types;

pub use errors::{BackendError, ErrorKind, EventStoreError, Result};
pub use sqlite::cancel::{CancelOnDrop, Cancellation};
pub use sqlite::connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use sqlite::migrations::run_migrations;
pub use store::{EventStore, EventsRepository, SqliteEventsRepository};
pub use types::{
    Event, EventToAdd, IdempotencyKey, Payload, Stream, StreamId, StreamToCreate, Version,
};
