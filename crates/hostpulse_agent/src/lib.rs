//! # hostpulse agent
//!
//! Accumulates active time in fixed-size windows and hands them to the sync
//! engine.
//!
//! This crate provides:
//! - [`Accumulator`]: the tick logic (date rollover, count, window rollover)
//! - [`Agent`]: store, engine, identity and clock wired together
//! - [`Scheduler`]: periodic ticks, syncs and integrity checks with a
//!   bounded shutdown
//! - [`SystemIdentity`]: best-effort machine identity and IP geolocation
//! - [`AgentConfig`]: defaults plus an optional JSON overlay
//!
//! ## Example
//!
//! ```rust,no_run
//! use hostpulse_agent::{shutdown_signal, AgentConfig, Schedule, Scheduler, SystemAgent};
//!
//! let config = AgentConfig::default();
//! let agent = SystemAgent::from_config(&config)?;
//! let report = Scheduler::new(agent, Schedule::from_config(&config)).block_on(shutdown_signal())?;
//! println!("{} ticks", report.ticks);
//! # Ok::<(), hostpulse_agent::AgentError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accumulator;
mod agent;
mod clock;
mod config;
mod error;
mod identity;
mod scheduler;

pub use accumulator::{Accumulator, AccumulatorState, TickOutcome, WindowPhase};
pub use agent::{Agent, Finalized, SystemAgent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{default_data_dir, AgentConfig};
pub use error::{AgentError, AgentResult};
pub use identity::{
    clean_serial, fingerprint, unknown_location, GeoService, IdentityProvider, StaticIdentity,
    SystemIdentity, LOCATION_UNKNOWN,
};
pub use scheduler::{shutdown_signal, Schedule, Scheduler, SchedulerReport};
