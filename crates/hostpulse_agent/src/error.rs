//! Error types for the agent.

use hostpulse_store::StoreError;
use hostpulse_sync_engine::SyncError;
use std::io;
use thiserror::Error;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur while running the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Local storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Synchronization failed outside a flush outcome.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration is invalid or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside the store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AgentError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
