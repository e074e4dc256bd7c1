//! # hostpulse sync engine
//!
//! Delivers accumulated windows to the remote collector.
//!
//! This crate provides:
//! - The flush cycle (probe → drain backlog → send current window)
//! - Collector transport abstraction with an HTTP implementation
//! - Wire payloads for the bulk and single-window endpoints
//! - Retry policy configuration for the scheduler
//!
//! ## Architecture
//!
//! A flush is **drain-then-send**:
//! 1. Probe connectivity; if unreachable, stop without touching the ledger
//! 2. POST the whole backlog in one bulk request, clear it on HTTP 200
//! 3. POST the current window with `active_time` fixed to the window size
//!
//! ## Key Invariants
//!
//! - Drain always happens before the single-window send
//! - The backlog is cleared all-or-nothing, never partially
//! - The engine never sleeps or retries; backoff belongs to the scheduler
//! - A timeout is a failure, never "unknown"

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod ledger;
mod payload;
mod state;
mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use state::{DrainOutcome, FlushOutcome, SyncEngine, SyncState, SyncStats, WindowOutcome};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpCollector, UreqClient};
pub use ledger::{MemoryLedger, SyncLedger};
pub use payload::{BulkSyncRequest, SingleSyncRequest};
pub use transport::{Collector, MockCollector};
