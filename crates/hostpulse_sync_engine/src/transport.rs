//! Transport layer abstraction for the collector.

use crate::error::{SyncError, SyncResult};
use crate::payload::{BulkSyncRequest, SingleSyncRequest};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A collector transport handles network communication with the backend.
///
/// This trait abstracts the network layer so the engine can run against
/// HTTP in production and a scripted mock in tests.
pub trait Collector: Send + Sync {
    /// Lightweight reachability probe. Must be bounded by a short timeout.
    fn check_connectivity(&self) -> bool;

    /// Delivers the whole backlog. `Ok` only on HTTP 200.
    fn send_bulk(&self, request: &BulkSyncRequest) -> SyncResult<()>;

    /// Delivers the current window. `Ok` only on HTTP 200.
    fn send_window(&self, request: &SingleSyncRequest) -> SyncResult<()>;
}

/// A scripted collector for testing.
///
/// Answers with configurable HTTP status codes and records every request it
/// receives, in order.
#[derive(Debug)]
pub struct MockCollector {
    connected: AtomicBool,
    bulk_status: Mutex<u16>,
    window_status: Mutex<u16>,
    probes: AtomicU64,
    bulk_requests: Mutex<Vec<BulkSyncRequest>>,
    window_requests: Mutex<Vec<SingleSyncRequest>>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockCollector {
    /// Creates a reachable collector that accepts everything.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            bulk_status: Mutex::new(200),
            window_status: Mutex::new(200),
            probes: AtomicU64::new(0),
            bulk_requests: Mutex::new(Vec::new()),
            window_requests: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates an unreachable collector.
    pub fn offline() -> Self {
        let collector = Self::new();
        collector.set_connected(false);
        collector
    }

    /// Sets the reachability probe result.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Sets the status returned by the bulk endpoint.
    pub fn set_bulk_status(&self, status: u16) {
        *self.bulk_status.lock() = status;
    }

    /// Sets the status returned by the single-window endpoint.
    pub fn set_window_status(&self, status: u16) {
        *self.window_status.lock() = status;
    }

    /// Number of connectivity probes so far.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }

    /// Bulk requests received, including rejected ones.
    pub fn bulk_requests(&self) -> Vec<BulkSyncRequest> {
        self.bulk_requests.lock().clone()
    }

    /// Single-window requests received, including rejected ones.
    pub fn window_requests(&self) -> Vec<SingleSyncRequest> {
        self.window_requests.lock().clone()
    }

    /// Endpoint names (`"bulk"`, `"window"`) in the order they were called.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn answer(status: u16) -> SyncResult<()> {
        if status == 200 {
            Ok(())
        } else {
            Err(SyncError::Status(status))
        }
    }
}

impl Default for MockCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MockCollector {
    fn check_connectivity(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.connected.load(Ordering::SeqCst)
    }

    fn send_bulk(&self, request: &BulkSyncRequest) -> SyncResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        self.calls.lock().push("bulk");
        self.bulk_requests.lock().push(request.clone());
        Self::answer(*self.bulk_status.lock())
    }

    fn send_window(&self, request: &SingleSyncRequest) -> SyncResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        self.calls.lock().push("window");
        self.window_requests.lock().push(request.clone());
        Self::answer(*self.window_status.lock())
    }
}
