//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! (usually a transaction). Repositories return raw rows and
//! [`BackendError`](crate::errors::BackendError)s; mapping to domain types and
//! domain errors is left to the store.

pub mod event;
pub mod stream;
