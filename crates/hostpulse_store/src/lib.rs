//! # hostpulse store
//!
//! Durable counter store for the hostpulse agent.
//!
//! This crate owns the two pieces of local state the agent keeps between
//! restarts:
//!
//! - the **current window** ([`IntervalRecord`]), a single mutable row that is
//!   rewritten on every tick
//! - the **backlog** ([`Backlog`]), completed windows waiting to be delivered
//!
//! ## Layers
//!
//! Backends are **opaque document stores**: they read and write whole named
//! byte blobs and know nothing about JSON or windows. [`CounterStore`] owns
//! the format and the self-healing read path on top of any backend.
//!
//! - [`FileBackend`] - one directory, atomic write-then-rename, advisory lock
//! - [`InMemoryBackend`] - shared map with fault injection, for tests
//!
//! ## Invariants
//!
//! - Every write replaces the whole document (no append log)
//! - A loaded interval never has `elapsed > window_size`
//! - A missing or unreadable document is repaired, not reported as fatal
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use hostpulse_store::{CounterStore, InMemoryBackend};
//!
//! let mut store = CounterStore::new(InMemoryBackend::new(), 5);
//! let state = store.load(Utc::now()).unwrap();
//! assert_eq!(state.interval.elapsed, 0);
//! assert!(state.backlog.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod counter;
mod error;
mod file;
mod memory;
mod record;

pub use backend::DocumentBackend;
pub use counter::{
    CounterStore, IntegrityReport, LoadedState, Repair, BACKLOG_DOCUMENT, INTERVAL_DOCUMENT,
};
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use record::{Backlog, CompletedWindow, Identity, IntervalRecord, Location, UNKNOWN};
