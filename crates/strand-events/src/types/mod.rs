//! Domain types: identifiers, streams, events and payloads.
//!
//! `Stream` and `Event` are read-only snapshots of stored rows. They expose
//! accessors only and hold no reference back to the backend.

mod event;
mod ids;
mod payload;
mod stream;

pub use event::{Event, EventToAdd};
pub use ids::{IdempotencyKey, StreamId, Version};
pub use payload::Payload;
pub use stream::{Stream, StreamToCreate};
