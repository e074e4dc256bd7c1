//! Document backend trait definition.

use crate::error::StoreResult;

/// A low-level document store.
///
/// Backends are **opaque**: a document is a name and a byte blob. The
/// [`CounterStore`](crate::CounterStore) owns all format interpretation.
///
/// # Invariants
///
/// - `write` replaces the whole document; a reader sees either the old or the
///   new bytes, never a mix (as far as the platform allows)
/// - `read` returns `None` for a document that was never written or was
///   removed, not an error
/// - Backends must be `Send` so the agent can move between worker threads
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait DocumentBackend: Send {
    /// Reads the full contents of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read.
    fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the contents of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written durably.
    fn write(&mut self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Returns true if the document currently exists.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Removes a document. Removing a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be removed.
    fn remove(&mut self, name: &str) -> StoreResult<()>;
}
