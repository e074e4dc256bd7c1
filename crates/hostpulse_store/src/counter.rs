//! The durable counter store: current window plus backlog.

use crate::backend::DocumentBackend;
use crate::error::{StoreError, StoreResult};
use crate::record::{Backlog, CompletedWindow, Identity, IntervalRecord, Location};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Document holding the current [`IntervalRecord`].
pub const INTERVAL_DOCUMENT: &str = "current_window.json";

/// Document holding the [`Backlog`].
pub const BACKLOG_DOCUMENT: &str = "backlog.json";

/// Something the self-healing read path had to fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// No interval document existed.
    IntervalMissing,
    /// The interval document could not be read or parsed.
    IntervalUnreadable(String),
    /// The interval document held `elapsed` above the window size.
    IntervalOutOfRange {
        /// The rejected value.
        elapsed: u32,
    },
    /// No backlog document existed.
    BacklogMissing,
    /// The backlog document could not be read or parsed.
    BacklogUnreadable(String),
}

/// Result of [`CounterStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedState {
    /// The current window, fresh if it had to be repaired.
    pub interval: IntervalRecord,
    /// Pending completed windows.
    pub backlog: Backlog,
    /// What was repaired, in the order it was found.
    pub repairs: Vec<Repair>,
}

impl LoadedState {
    /// Returns true if anything had to be synthesized.
    #[must_use]
    pub fn was_repaired(&self) -> bool {
        !self.repairs.is_empty()
    }
}

/// Result of [`CounterStore::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Documents that were missing and have been recreated.
    pub recreated: Vec<&'static str>,
}

impl IntegrityReport {
    /// Returns true if both documents were present.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.recreated.is_empty()
    }
}

/// Durable store for the current window and the backlog.
///
/// Both records are whole JSON documents rewritten on every mutation. The
/// read path never fails on bad data: a missing, unparsable or out-of-range
/// interval becomes a fresh one and is written back immediately.
///
/// There is exactly one writer per process; the store takes `&mut self` for
/// every mutation and relies on the caller to serialize access.
#[derive(Debug)]
pub struct CounterStore<B: DocumentBackend> {
    backend: B,
    window_size: u32,
}

impl<B: DocumentBackend> CounterStore<B> {
    /// Creates a store over `backend` for windows of `window_size` ticks.
    pub fn new(backend: B, window_size: u32) -> Self {
        Self {
            backend,
            window_size,
        }
    }

    /// Returns the rollover threshold used by the load-time sanity check.
    #[must_use]
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the store, returning the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Loads both records, repairing and persisting whatever is broken.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be read (as opposed to parsed)
    /// or if a repaired record cannot be written back. Nothing is rewritten
    /// when a read fails.
    pub fn load(&mut self, now: DateTime<Utc>) -> StoreResult<LoadedState> {
        let mut repairs = Vec::new();

        let interval = match self.read_interval() {
            Ok(Some(record)) if record.elapsed <= self.window_size => record,
            Ok(Some(record)) => {
                warn!(
                    elapsed = record.elapsed,
                    window_size = self.window_size,
                    "stored window out of range, starting fresh"
                );
                repairs.push(Repair::IntervalOutOfRange {
                    elapsed: record.elapsed,
                });
                self.fresh_interval(now)
            }
            Ok(None) => {
                debug!("no stored window, starting fresh");
                repairs.push(Repair::IntervalMissing);
                self.fresh_interval(now)
            }
            Err(StoreError::Json(e)) => {
                warn!(error = %e, "stored window unreadable, starting fresh");
                repairs.push(Repair::IntervalUnreadable(e.to_string()));
                self.fresh_interval(now)
            }
            Err(e) => return Err(e),
        };

        let backlog = match self.read_backlog() {
            Ok(Some(backlog)) => backlog,
            Ok(None) => {
                repairs.push(Repair::BacklogMissing);
                Backlog::new()
            }
            Err(StoreError::Json(e)) => {
                warn!(error = %e, "stored backlog unreadable, starting empty");
                repairs.push(Repair::BacklogUnreadable(e.to_string()));
                Backlog::new()
            }
            Err(e) => return Err(e),
        };

        let interval_repaired = repairs.iter().any(|r| {
            matches!(
                r,
                Repair::IntervalMissing
                    | Repair::IntervalUnreadable(_)
                    | Repair::IntervalOutOfRange { .. }
            )
        });
        if interval_repaired {
            self.save_interval(&interval)?;
        }
        if repairs
            .iter()
            .any(|r| matches!(r, Repair::BacklogMissing | Repair::BacklogUnreadable(_)))
        {
            self.save_backlog(&backlog)?;
        }

        Ok(LoadedState {
            interval,
            backlog,
            repairs,
        })
    }

    /// Reads the interval record without repairing it.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if the stored `elapsed` exceeds the window size, or
    /// a read/parse error.
    pub fn load_interval(&self) -> StoreResult<Option<IntervalRecord>> {
        match self.read_interval()? {
            Some(record) if record.elapsed > self.window_size => Err(StoreError::Corrupted(
                format!(
                    "elapsed {} exceeds window size {}",
                    record.elapsed, self.window_size
                ),
            )),
            other => Ok(other),
        }
    }

    /// Reads the backlog without repairing it. A missing backlog is empty.
    ///
    /// # Errors
    ///
    /// Returns a read or parse error.
    pub fn load_backlog(&self) -> StoreResult<Backlog> {
        Ok(self.read_backlog()?.unwrap_or_default())
    }

    /// Overwrites the interval record.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    pub fn save_interval(&mut self, record: &IntervalRecord) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(record)?;
        self.backend.write(INTERVAL_DOCUMENT, &data)
    }

    /// Overwrites the backlog.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    pub fn save_backlog(&mut self, backlog: &Backlog) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(backlog)?;
        self.backend.write(BACKLOG_DOCUMENT, &data)
    }

    /// Appends one completed window and returns the new backlog length.
    ///
    /// A backlog that no longer parses is replaced rather than blocking the
    /// append.
    ///
    /// # Errors
    ///
    /// Returns an error if the backlog cannot be read or the updated backlog
    /// cannot be written; the stored backlog is then unchanged.
    pub fn append_backlog(&mut self, entry: CompletedWindow) -> StoreResult<usize> {
        let mut backlog = match self.read_backlog() {
            Ok(backlog) => backlog.unwrap_or_default(),
            Err(StoreError::Json(e)) => {
                warn!(error = %e, "backlog unreadable during append, replacing");
                Backlog::new()
            }
            Err(e) => return Err(e),
        };
        backlog.push(entry);
        self.save_backlog(&backlog)?;
        Ok(backlog.len())
    }

    /// Atomically replaces the backlog with an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the empty backlog cannot be written; the stored
    /// backlog is then unchanged.
    pub fn clear_backlog(&mut self) -> StoreResult<()> {
        self.save_backlog(&Backlog::new())
    }

    /// Recreates any document that disappeared from the backend.
    ///
    /// The interval is rewritten from `current` (the caller's in-memory
    /// state) and the backlog as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a missing document cannot be recreated.
    pub fn verify(&mut self, current: &IntervalRecord) -> StoreResult<IntegrityReport> {
        let mut report = IntegrityReport::default();

        if !self.backend.exists(INTERVAL_DOCUMENT)? {
            warn!("window document missing, recreating");
            self.save_interval(current)?;
            report.recreated.push(INTERVAL_DOCUMENT);
        }
        if !self.backend.exists(BACKLOG_DOCUMENT)? {
            warn!("backlog document missing, recreating");
            self.save_backlog(&Backlog::new())?;
            report.recreated.push(BACKLOG_DOCUMENT);
        }

        Ok(report)
    }

    /// Discards all state: a fresh window for `now` and an empty backlog.
    ///
    /// # Errors
    ///
    /// Returns an error if either document cannot be written.
    pub fn reset(&mut self, now: DateTime<Utc>) -> StoreResult<IntervalRecord> {
        let interval = self.fresh_interval(now);
        self.save_interval(&interval)?;
        self.save_backlog(&Backlog::new())?;
        Ok(interval)
    }

    fn fresh_interval(&self, now: DateTime<Utc>) -> IntervalRecord {
        IntervalRecord::fresh(Identity::unknown(), Location::default(), now)
    }

    fn read_interval(&self) -> StoreResult<Option<IntervalRecord>> {
        match self.backend.read(INTERVAL_DOCUMENT)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn read_backlog(&self) -> StoreResult<Option<Backlog>> {
        match self.backend.read(BACKLOG_DOCUMENT)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }
}
