//! Error types for the sync engine.

use hostpulse_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Collector answered with something other than HTTP 200.
    #[error("collector returned HTTP {0}")]
    Status(u16),

    /// A payload could not be encoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Collector is unreachable.
    #[error("collector unreachable")]
    NotConnected,

    /// Local store error while reading or clearing the backlog.
    #[error("ledger error: {0}")]
    Ledger(#[from] StoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later attempt may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::NotConnected => true,
            SyncError::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}
