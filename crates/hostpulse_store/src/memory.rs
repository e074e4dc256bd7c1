//! In-memory document backend for testing.

use crate::backend::DocumentBackend;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An in-memory document backend.
///
/// Clones share the same documents, so a test can hand one clone to the
/// store and keep another to inspect or tamper with the stored bytes.
///
/// # Fault injection
///
/// - [`set_fail_writes`](Self::set_fail_writes) makes every write fail with
///   an I/O error, simulating a full disk or a permissions problem
/// - [`set_fail_reads`](Self::set_fail_reads) does the same for reads,
///   simulating a transient device error on a document that is intact
/// - [`insert_raw`](Self::insert_raw) stores arbitrary bytes, simulating a
///   torn or hand-edited document
///
/// # Example
///
/// ```rust
/// use hostpulse_store::{DocumentBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let probe = backend.clone();
/// backend.write("doc", b"data").unwrap();
/// assert_eq!(probe.raw("doc").unwrap(), b"data");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    documents: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw bytes under `name`, bypassing fault injection.
    pub fn insert_raw(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.documents.write().insert(name.to_string(), data.into());
    }

    /// Returns a copy of the raw bytes stored under `name`.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.documents.read().get(name).cloned()
    }

    /// Deletes a document behind the store's back.
    pub fn delete(&self, name: &str) {
        self.documents.write().remove(name);
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl DocumentBackend for InMemoryBackend {
    fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected read failure",
            )));
        }
        Ok(self.raw(name))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        self.insert_raw(name, data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.documents.read().contains_key(name))
    }

    fn remove(&mut self, name: &str) -> StoreResult<()> {
        self.delete(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_write_and_read() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.read("a").unwrap(), None);

        backend.write("a", b"hello").unwrap();
        assert_eq!(backend.read("a").unwrap().unwrap(), b"hello");
        assert!(backend.exists("a").unwrap());
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn memory_clones_share_documents() {
        let mut backend = InMemoryBackend::new();
        let probe = backend.clone();

        backend.write("a", b"1").unwrap();
        assert_eq!(probe.raw("a").unwrap(), b"1");

        probe.delete("a");
        assert!(!backend.exists("a").unwrap());
    }

    #[test]
    fn memory_injected_write_failure() {
        let mut backend = InMemoryBackend::new();
        backend.write("a", b"old").unwrap();

        backend.set_fail_writes(true);
        assert!(matches!(backend.write("a", b"new"), Err(StoreError::Io(_))));
        assert_eq!(backend.raw("a").unwrap(), b"old");

        backend.set_fail_writes(false);
        backend.write("a", b"new").unwrap();
        assert_eq!(backend.raw("a").unwrap(), b"new");

        backend.set_fail_reads(true);
        assert!(matches!(backend.read("a"), Err(StoreError::Io(_))));
        backend.set_fail_reads(false);
        assert_eq!(backend.read("a").unwrap().unwrap(), b"new");
    }

    #[test]
    fn memory_insert_raw_bypasses_faults() {
        let backend = InMemoryBackend::new();
        backend.set_fail_writes(true);
        backend.insert_raw("a", "not json");
        assert_eq!(backend.raw("a").unwrap(), b"not json");
        assert_eq!(backend.write_count(), 0);
    }
}
