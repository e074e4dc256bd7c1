//! CLI command implementations.

pub mod inspect;
pub mod reset;
pub mod run;
pub mod sync;
pub mod verify;
