//! # hostpulse testkit
//!
//! Test utilities for the hostpulse agent.
//!
//! This crate provides:
//! - [`TestAgent`]: an agent over an in-memory or temporary on-disk store,
//!   with a manual clock and a scripted collector, that can be restarted
//! - Property-based generators for tick/flush scripts
//! - [`CounterModel`]: a reference model the agent is checked against
//!
//! ## Usage
//!
//! ```rust
//! use hostpulse_testkit::prelude::*;
//!
//! let mut agent = TestAgent::memory(5);
//! agent.collector().set_connected(false);
//! for _ in 0..6 {
//!     agent.tick().unwrap();
//! }
//! assert_eq!(agent.record().elapsed, 6);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
