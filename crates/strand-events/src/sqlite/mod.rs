//! `SQLite` persistence backend: connection pool, migrations, transactional
//! executor and repositories.

pub mod cancel;
pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod transaction;
