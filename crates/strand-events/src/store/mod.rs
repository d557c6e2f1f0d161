//! High-level store APIs.
//!
//! [`EventStore`] is the blocking core; [`EventsRepository`] is the async
//! port, implemented for `SQLite` by [`SqliteEventsRepository`].

pub mod event_store;
pub mod repository;

pub use event_store::EventStore;
pub use repository::{EventsRepository, SqliteEventsRepository};
