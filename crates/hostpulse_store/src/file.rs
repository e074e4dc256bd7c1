//! File-based document backend.
//!
//! Layout of a data directory:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                  # Advisory lock for single-writer
//! ├─ current_window.json
//! └─ backlog.json
//! ```

use crate::backend::DocumentBackend;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const TEMP_SUFFIX: &str = ".tmp";

/// A directory of whole-file documents.
///
/// # Durability
///
/// Every `write` goes through write-then-rename:
/// 1. Write to `<name>.tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over `<name>`
/// 4. Fsync the directory so the rename itself is durable
///
/// A crash leaves either the old or the new document, plus at worst a stale
/// `.tmp` file that the next write overwrites.
///
/// # Missing directory
///
/// If the directory is deleted while the agent runs, the next `write`
/// recreates it and, for a locked handle, takes a fresh lock there. Reads of
/// a missing directory return `None`.
///
/// # Example
///
/// ```no_run
/// use hostpulse_store::{DocumentBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("agent-data")).unwrap();
/// backend.write("current_window.json", b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    /// Lock file handle (held for exclusive access), if locked.
    _lock_file: Option<File>,
}

impl FileBackend {
    /// Opens or creates a data directory and takes its exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `Locked`)
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::prepare_dir(path)?;
        let lock_file = Self::acquire_lock(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: Some(lock_file),
        })
    }

    /// Opens a data directory without taking the lock.
    ///
    /// For read-mostly operator tools that run next to a live agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_shared(path: &Path) -> StoreResult<Self> {
        Self::prepare_dir(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: None,
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the full path of a document.
    #[must_use]
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Returns true if this handle holds the directory lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self._lock_file.is_some()
    }

    fn acquire_lock(path: &Path) -> StoreResult<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.display().to_string()));
        }
        Ok(lock_file)
    }

    fn prepare_dir(path: &Path) -> StoreResult<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced.
        Ok(())
    }
}

impl DocumentBackend for FileBackend {
    fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.document_path(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, name: &str, data: &[u8]) -> StoreResult<()> {
        if !self.path.exists() {
            tracing::warn!(dir = %self.path.display(), "data directory missing, recreating");
            fs::create_dir_all(&self.path)?;
            // the old lock went with the directory
            if self._lock_file.is_some() {
                self._lock_file = Some(Self::acquire_lock(&self.path)?);
            }
        }

        let target = self.document_path(name);
        let temp = self.path.join(format!("{name}{TEMP_SUFFIX}"));

        let mut file = File::create(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &target)?;
        self.sync_directory()?;

        Ok(())
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.document_path(name).is_file())
    }

    fn remove(&mut self, name: &str) -> StoreResult<()> {
        match fs::remove_file(self.document_path(name)) {
            Ok(()) => self.sync_directory(),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
