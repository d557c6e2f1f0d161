//! Cancellation of backend work running on a blocking thread.
//!
//! A [`Cancellation`] is shared between the task that owns an operation and
//! the thread executing it. Cancelling trips the token and interrupts the
//! statement running on the attached connection. An open transaction then
//! fails and rolls back instead of committing.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, InterruptHandle};
use tokio_util::sync::CancellationToken;

use crate::errors::{EventStoreError, Result};

/// Cancellation signal for one unit of backend work.
#[derive(Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    interrupt: Arc<Mutex<Option<InterruptHandle>>>,
}

impl Cancellation {
    /// A signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal and interrupt the attached connection, if any.
    pub fn cancel(&self) {
        // Held across both steps so `attach` sees either the token or the
        // handle, never neither.
        let slot = self.interrupt.lock();
        self.token.cancel();
        if let Some(handle) = slot.as_ref() {
            handle.interrupt();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// [`EventStoreError::Cancelled`] once the signal has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EventStoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Route interrupts to `conn` until the returned guard is dropped.
    ///
    /// The guard must be dropped before `conn` goes back to the pool, or a
    /// late cancel would interrupt whoever checks it out next.
    pub(crate) fn attach(&self, conn: &Connection) -> Result<Attached<'_>> {
        let mut slot = self.interrupt.lock();
        self.check()?;
        *slot = Some(conn.get_interrupt_handle());
        Ok(Attached {
            slot: &self.interrupt,
        })
    }

    /// A guard that cancels when dropped unless disarmed first.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(Some(self.clone()))
    }
}

/// Detaches the connection from its [`Cancellation`] on drop.
pub(crate) struct Attached<'a> {
    slot: &'a Mutex<Option<InterruptHandle>>,
}

impl std::fmt::Debug for Attached<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attached").finish_non_exhaustive()
    }
}

impl Drop for Attached<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// Cancels its [`Cancellation`] when dropped.
#[must_use = "dropping the guard cancels immediately"]
pub struct CancelOnDrop(Option<Cancellation>);

impl CancelOnDrop {
    /// Drop without cancelling.
    pub fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancellation) = self.0.take() {
            cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn fresh_signal_passes_check() {
        let cancel = Cancellation::new();
        assert!(!cancel.is_cancelled());
        assert!(cancel.check().is_ok());
    }

    #[test]
    fn attach_after_cancel_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();
        assert_matches!(cancel.attach(&conn), Err(EventStoreError::Cancelled));
    }

    #[test]
    fn attached_handle_released_on_drop() {
        let conn = Connection::open_in_memory().unwrap();
        let cancel = Cancellation::new();
        {
            let _attached = cancel.attach(&conn).unwrap();
            assert!(cancel.interrupt.lock().is_some());
        }
        assert!(cancel.interrupt.lock().is_none());

        // Cancelling after detaching leaves the connection usable.
        cancel.cancel();
        let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).unwrap();
        assert_eq!(one, 1);
    }

    #[test]
    fn guard_cancels_on_drop_unless_disarmed() {
        let cancel = Cancellation::new();
        cancel.cancel_on_drop().disarm();
        assert!(!cancel.is_cancelled());

        drop(cancel.cancel_on_drop());
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn clones_share_the_signal() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        other.cancel();
        assert_matches!(cancel.check(), Err(EventStoreError::Cancelled));
    }
}
