//! Transactional executor.
//!
//! [`run_in_transaction`] checks a connection out of the pool, begins a
//! transaction, runs the supplied work against it and commits. Work that
//! returns an error is propagated unchanged and the transaction is rolled
//! back when it is dropped, so no partial write is ever visible. A fired
//! [`Cancellation`] interrupts the work and always ends in a rollback.

use rusqlite::{Transaction, TransactionBehavior};
use tracing::{debug, warn};

use crate::errors::{BackendError, EventStoreError, Result};
use crate::sqlite::cancel::Cancellation;
use crate::sqlite::connection::ConnectionPool;

/// Locking mode used when beginning a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransactionMode {
    /// Acquire locks lazily on first read/write (`BEGIN DEFERRED`).
    Deferred,
    /// Take the write lock up front (`BEGIN IMMEDIATE`).
    ///
    /// Concurrent writers queue on the busy timeout instead of failing with
    /// a lock upgrade error mid-transaction.
    #[default]
    Immediate,
}

impl From<TransactionMode> for TransactionBehavior {
    fn from(mode: TransactionMode) -> Self {
        match mode {
            TransactionMode::Deferred => Self::Deferred,
            TransactionMode::Immediate => Self::Immediate,
        }
    }
}

/// Run `work` inside a single transaction.
///
/// # Errors
///
/// - [`EventStoreError::TransactionStartFailure`] if no connection could be
///   checked out or the transaction could not begin.
/// - Any error returned by `work`, unchanged (the transaction is rolled back).
/// - [`EventStoreError::TransactionCommitFailure`] if the commit fails (the
///   transaction is rolled back).
/// - [`EventStoreError::Cancelled`] if `cancel` fired before the commit (the
///   transaction is rolled back).
pub fn run_in_transaction<T, F>(
    pool: &ConnectionPool,
    mode: TransactionMode,
    cancel: &Cancellation,
    work: F,
) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    cancel.check()?;
    let mut conn = pool.get().map_err(|e| {
        warn!(error = %e, "connection checkout failed");
        EventStoreError::TransactionStartFailure(BackendError::Pool(e))
    })?;
    // Declared after `conn` so it detaches before the connection is returned.
    let _attached = cancel.attach(&conn)?;

    let tx = conn.transaction_with_behavior(mode.into()).map_err(|e| {
        warn!(error = %e, ?mode, "failed to begin transaction");
        EventStoreError::TransactionStartFailure(BackendError::Sqlite(e))
    })?;

    let value = match work(&tx) {
        Ok(value) => value,
        Err(e) if cancel.is_cancelled() => {
            debug!(error = %e, "work interrupted by cancellation");
            return Err(EventStoreError::Cancelled);
        }
        Err(e) => return Err(e),
    };
    cancel.check()?;

    tx.commit().map_err(|e| {
        warn!(error = %e, "failed to commit transaction");
        EventStoreError::TransactionCommitFailure(BackendError::Sqlite(e))
    })?;

    Ok(value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::sqlite::connection::{self, ConnectionConfig};
    use crate::sqlite::migrations::run_migrations;

    fn setup(config: &ConnectionConfig) -> ConnectionPool {
        let pool = connection::new_in_memory(config).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        pool
    }

    fn stream_count(pool: &ConnectionPool) -> i64 {
        pool.get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM streams", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn commits_on_success() {
        let pool = setup(&ConnectionConfig::default());
        let cancel = Cancellation::new();
        let out = run_in_transaction(&pool, TransactionMode::Immediate, &cancel, |tx| {
            tx.execute(
                "INSERT INTO streams (stream_id, idempotency_key) VALUES ('a', 'k')",
                [],
            )
            .map_err(|e| EventStoreError::Internal(e.to_string()))?;
            Ok(42)
        })
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(stream_count(&pool), 1);
    }

    #[test]
    fn rolls_back_on_work_error() {
        let pool = setup(&ConnectionConfig::default());
        let cancel = Cancellation::new();
        let err = run_in_transaction::<(), _>(&pool, TransactionMode::Deferred, &cancel, |tx| {
            tx.execute(
                "INSERT INTO streams (stream_id, idempotency_key) VALUES ('a', 'k')",
                [],
            )
            .unwrap();
            Err(EventStoreError::Internal("boom".into()))
        })
        .unwrap_err();
        assert_matches!(err, EventStoreError::Internal(msg) if msg == "boom");
        assert_eq!(stream_count(&pool), 0);
    }

    #[test]
    fn start_failure_when_pool_exhausted() {
        let pool = setup(&ConnectionConfig {
            connection_timeout_ms: 50,
            ..Default::default()
        });
        let _held = pool.get().unwrap();
        let err = run_in_transaction(&pool, TransactionMode::Immediate, &Cancellation::new(), |_| {
            Ok(())
        })
        .unwrap_err();
        assert_matches!(
            err,
            EventStoreError::TransactionStartFailure(BackendError::Pool(_))
        );
    }

    #[test]
    fn commit_failure_rolls_back() {
        let pool = setup(&ConnectionConfig::default());
        let cancel = Cancellation::new();
        let err = run_in_transaction(&pool, TransactionMode::Immediate, &cancel, |tx| {
            // Deferred foreign keys are only checked at COMMIT.
            tx.execute_batch(
                "PRAGMA defer_foreign_keys = ON;
                 INSERT INTO events (stream_id, version, idempotency_key, payload)
                    VALUES ('missing', 1, 'e', x'00');",
            )
            .unwrap();
            Ok(())
        })
        .unwrap_err();
        assert_matches!(
            err,
            EventStoreError::TransactionCommitFailure(BackendError::Sqlite(_))
        );
        let events: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(events, 0);
    }

    #[test]
    fn cancelled_before_start_never_checks_out() {
        let pool = setup(&ConnectionConfig {
            connection_timeout_ms: 50,
            ..Default::default()
        });
        let _held = pool.get().unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = run_in_transaction(&pool, TransactionMode::Immediate, &cancel, |_| Ok(()))
            .unwrap_err();
        assert_matches!(err, EventStoreError::Cancelled);
    }

    #[test]
    fn cancel_during_work_rolls_back() {
        let pool = setup(&ConnectionConfig::default());
        let cancel = Cancellation::new();
        let err = run_in_transaction(&pool, TransactionMode::Immediate, &cancel, |tx| {
            tx.execute(
                "INSERT INTO streams (stream_id, idempotency_key) VALUES ('a', 'k')",
                [],
            )
            .unwrap();
            cancel.cancel();
            Ok(())
        })
        .unwrap_err();
        assert_matches!(err, EventStoreError::Cancelled);
        assert_eq!(stream_count(&pool), 0);
    }

    #[test]
    fn interrupted_work_reports_cancelled() {
        let pool = setup(&ConnectionConfig::default());
        let cancel = Cancellation::new();
        let err = run_in_transaction::<(), _>(&pool, TransactionMode::Immediate, &cancel, |tx| {
            tx.execute(
                "INSERT INTO streams (stream_id, idempotency_key) VALUES ('a', 'k')",
                [],
            )
            .unwrap();
            cancel.cancel();
            Err(EventStoreError::Internal("interrupted".into()))
        })
        .unwrap_err();
        assert_matches!(err, EventStoreError::Cancelled);
        assert_eq!(stream_count(&pool), 0);
    }

    #[test]
    fn late_cancel_leaves_pooled_connection_usable() {
        let pool = setup(&ConnectionConfig::default());
        let cancel = Cancellation::new();
        run_in_transaction(&pool, TransactionMode::Immediate, &cancel, |_| Ok(())).unwrap();
        cancel.cancel();
        // The in-memory pool holds a single connection, so this reuses it.
        assert_eq!(stream_count(&pool), 0);
    }

    #[test]
    fn default_mode_is_immediate() {
        assert_eq!(TransactionMode::default(), TransactionMode::Immediate);
        assert!(matches!(
            TransactionBehavior::from(TransactionMode::Deferred),
            TransactionBehavior::Deferred
        ));
    }
}
