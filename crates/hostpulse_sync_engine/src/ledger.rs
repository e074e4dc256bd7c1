//! Local source of pending windows for the drain phase.

use crate::error::{SyncError, SyncResult};
use hostpulse_store::{CompletedWindow, CounterStore, DocumentBackend};
use std::io;

/// Where the engine reads the backlog from and clears it after delivery.
///
/// `clear_pending` must be all-or-nothing: on error the pending set is
/// unchanged and will be offered again on the next drain.
pub trait SyncLedger {
    /// Returns every pending window, oldest first.
    fn pending_windows(&mut self) -> SyncResult<Vec<CompletedWindow>>;

    /// Discards every pending window after a successful bulk delivery.
    fn clear_pending(&mut self) -> SyncResult<()>;
}

impl<B: DocumentBackend> SyncLedger for CounterStore<B> {
    fn pending_windows(&mut self) -> SyncResult<Vec<CompletedWindow>> {
        Ok(self.load_backlog()?.records)
    }

    fn clear_pending(&mut self) -> SyncResult<()> {
        Ok(self.clear_backlog()?)
    }
}

/// An in-memory ledger for testing.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    pending: Vec<CompletedWindow>,
    fail_clear: bool,
    clears: u32,
}

impl MemoryLedger {
    /// Creates a ledger holding `pending`.
    pub fn new(pending: Vec<CompletedWindow>) -> Self {
        Self {
            pending,
            ..Self::default()
        }
    }

    /// Makes `clear_pending` fail, leaving the entries in place.
    pub fn set_fail_clear(&mut self, fail: bool) {
        self.fail_clear = fail;
    }

    /// Entries still pending.
    pub fn pending(&self) -> &[CompletedWindow] {
        &self.pending
    }

    /// Number of successful clears.
    pub fn clear_count(&self) -> u32 {
        self.clears
    }
}

impl SyncLedger for MemoryLedger {
    fn pending_windows(&mut self) -> SyncResult<Vec<CompletedWindow>> {
        Ok(self.pending.clone())
    }

    fn clear_pending(&mut self) -> SyncResult<()> {
        if self.fail_clear {
            return Err(SyncError::Ledger(
                io::Error::new(io::ErrorKind::Other, "injected clear failure").into(),
            ));
        }
        self.pending.clear();
        self.clears += 1;
        Ok(())
    }
}
