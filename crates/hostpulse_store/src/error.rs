//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored document holds values outside its valid range.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another agent holds the data directory lock.
    #[error("data directory is locked by another process: {0}")]
    Locked(String),
}
