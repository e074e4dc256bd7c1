//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::ledger::SyncLedger;
use crate::payload::{BulkSyncRequest, SingleSyncRequest};
use crate::transport::Collector;
use hostpulse_store::IntervalRecord;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, no flush has run yet.
    Idle,
    /// Engine is probing the collector.
    Probing,
    /// Engine is delivering the backlog.
    Draining,
    /// Engine is delivering the current window.
    SendingWindow,
    /// Last flush succeeded.
    Synced,
    /// Last probe found the collector unreachable.
    Offline,
    /// Last flush reached the collector but delivered nothing.
    Error,
}

impl SyncState {
    /// Returns true if a flush is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Probing | SyncState::Draining | SyncState::SendingWindow
        )
    }
}

/// Statistics about flushes since the engine was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Flushes started.
    pub flushes_attempted: u64,
    /// Flushes whose outcome was a success.
    pub flushes_succeeded: u64,
    /// Flushes abandoned at the probe.
    pub offline_flushes: u64,
    /// Completed windows delivered through the bulk endpoint.
    pub windows_drained: u64,
    /// Current windows delivered through the single endpoint.
    pub windows_sent: u64,
    /// Failed bulk or single deliveries.
    pub failures: u64,
    /// Last successful flush.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of the bulk drain phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The collector was unreachable; the ledger was not touched.
    Skipped,
    /// Nothing was pending; no request was sent.
    Empty,
    /// This many windows were delivered and the backlog was cleared.
    Delivered(usize),
    /// Delivery or clearing failed; the backlog is unchanged.
    Failed(String),
}

impl DrainOutcome {
    /// Returns true for `Empty` and `Delivered`.
    pub fn is_success(&self) -> bool {
        matches!(self, DrainOutcome::Empty | DrainOutcome::Delivered(_))
    }
}

/// Result of the single-window phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    /// The collector was unreachable; nothing was sent.
    Skipped,
    /// The collector answered HTTP 200.
    Sent,
    /// The request failed.
    Failed(String),
}

/// Result of a flush.
#[derive(Debug, Clone)]
pub struct FlushOutcome {
    /// Whether the connectivity probe succeeded.
    pub reachable: bool,
    /// Drain phase result.
    pub drain: DrainOutcome,
    /// Single-window phase result.
    pub window: WindowOutcome,
    /// Wall time of the whole flush.
    pub duration: Duration,
}

impl FlushOutcome {
    /// True if the collector was reachable and at least one phase succeeded.
    pub fn is_success(&self) -> bool {
        self.reachable && (self.drain.is_success() || self.window == WindowOutcome::Sent)
    }

    fn offline(duration: Duration) -> Self {
        Self {
            reachable: false,
            drain: DrainOutcome::Skipped,
            window: WindowOutcome::Skipped,
            duration,
        }
    }
}

/// Delivers the backlog and the current window to the collector.
///
/// The engine never sleeps and never retries. It holds no lock across a
/// network call other than the caller's `&mut` on the ledger, so the caller
/// decides whether flushes can overlap (they should not).
pub struct SyncEngine<C: Collector> {
    config: SyncConfig,
    collector: Arc<C>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<C: Collector> SyncEngine<C> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, collector: C) -> Self {
        Self::with_shared(config, Arc::new(collector))
    }

    /// Creates a sync engine over a collector shared with the caller.
    pub fn with_shared(config: SyncConfig, collector: Arc<C>) -> Self {
        Self {
            config,
            collector,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the collector.
    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs one flush: probe, drain the backlog, then send `current`.
    ///
    /// The single-window request always reports the configured window size
    /// as `active_time`, whatever `current.elapsed` holds.
    pub fn flush<L: SyncLedger + ?Sized>(
        &self,
        ledger: &mut L,
        current: &IntervalRecord,
    ) -> FlushOutcome {
        let start = Instant::now();
        self.stats.write().flushes_attempted += 1;

        if !self.probe() {
            return FlushOutcome::offline(start.elapsed());
        }

        let drain = self.drain_reachable(ledger);
        let window = self.send_window(current);

        let outcome = FlushOutcome {
            reachable: true,
            drain,
            window,
            duration: start.elapsed(),
        };
        self.finish(&outcome);
        outcome
    }

    /// Probes the collector and, if reachable, drains the backlog only.
    pub fn drain<L: SyncLedger + ?Sized>(&self, ledger: &mut L) -> DrainOutcome {
        if !self.probe() {
            return DrainOutcome::Skipped;
        }
        let outcome = self.drain_reachable(ledger);
        self.set_state(if outcome.is_success() {
            SyncState::Synced
        } else {
            SyncState::Error
        });
        outcome
    }

    fn probe(&self) -> bool {
        self.set_state(SyncState::Probing);
        if self.collector.check_connectivity() {
            return true;
        }

        debug!("collector unreachable, skipping flush");
        self.set_state(SyncState::Offline);
        let mut stats = self.stats.write();
        stats.offline_flushes += 1;
        stats.last_error = Some("collector unreachable".into());
        false
    }

    fn drain_reachable<L: SyncLedger + ?Sized>(&self, ledger: &mut L) -> DrainOutcome {
        self.set_state(SyncState::Draining);

        let pending = match ledger.pending_windows() {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "could not read backlog");
                self.record_failure(&e.to_string());
                return DrainOutcome::Failed(e.to_string());
            }
        };
        if pending.is_empty() {
            return DrainOutcome::Empty;
        }

        let count = pending.len();
        let request = BulkSyncRequest::new(pending);
        if let Err(e) = self.collector.send_bulk(&request) {
            warn!(error = %e, windows = count, "bulk sync failed, backlog kept");
            self.record_failure(&e.to_string());
            return DrainOutcome::Failed(e.to_string());
        }

        // Delivered but not cleared: the next drain resends the same windows.
        if let Err(e) = ledger.clear_pending() {
            warn!(error = %e, windows = count, "bulk sync delivered but backlog not cleared");
            self.record_failure(&e.to_string());
            return DrainOutcome::Failed(e.to_string());
        }

        info!(windows = count, "backlog drained");
        self.stats.write().windows_drained += count as u64;
        DrainOutcome::Delivered(count)
    }

    fn send_window(&self, current: &IntervalRecord) -> WindowOutcome {
        self.set_state(SyncState::SendingWindow);

        let request = SingleSyncRequest::from_window(current, self.config.window_size);
        match self.collector.send_window(&request) {
            Ok(()) => {
                debug!(date = %request.date, active_time = request.active_time, "window synced");
                self.stats.write().windows_sent += 1;
                WindowOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "window sync failed");
                self.record_failure(&e.to_string());
                WindowOutcome::Failed(e.to_string())
            }
        }
    }

    fn record_failure(&self, message: &str) {
        let mut stats = self.stats.write();
        stats.failures += 1;
        stats.last_error = Some(message.to_string());
    }

    fn finish(&self, outcome: &FlushOutcome) {
        if outcome.is_success() {
            self.set_state(SyncState::Synced);
            let mut stats = self.stats.write();
            stats.flushes_succeeded += 1;
            stats.last_sync_time = Some(Instant::now());
            if outcome.drain.is_success() && outcome.window == WindowOutcome::Sent {
                stats.last_error = None;
            }
        } else {
            self.set_state(SyncState::Error);
        }
    }
}
