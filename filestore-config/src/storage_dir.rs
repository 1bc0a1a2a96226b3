//! The directory that holds all stored files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

static PROCESS_STORAGE_DIR: OnceLock<StorageDir> = OnceLock::new();
/// Held while the process-wide directory is being created.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Handle to the storage directory.
///
/// The directory exists on disk for as long as the handle is around. It is never removed by this
/// type.
#[derive(Debug, PartialEq, Eq)]
pub struct StorageDir {
    path: PathBuf,
}

impl StorageDir {
    /// Creates the directory at `path`, including missing parents, and returns a handle to it.
    ///
    /// This succeeds if the directory already exists. It fails if `path` exists but is not a
    /// directory.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "storage directory ready");
        Ok(Self { path })
    }

    /// Returns the process-wide storage directory, creating it on the first call.
    ///
    /// Only the first successful call determines the directory. Every later call returns that same
    /// instance and ignores `path`, without touching the filesystem. Concurrent first calls are
    /// serialized, so only the winning caller's directory is ever created.
    pub fn init(path: impl Into<PathBuf>) -> io::Result<&'static StorageDir> {
        if let Some(dir) = PROCESS_STORAGE_DIR.get() {
            return Ok(dir);
        }

        // the guard protects no data, so a panic while holding it leaves nothing inconsistent
        let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = PROCESS_STORAGE_DIR.get() {
            return Ok(dir);
        }

        let dir = Self::create(path)?;
        Ok(PROCESS_STORAGE_DIR.get_or_init(|| dir))
    }

    /// Returns the process-wide storage directory if [`StorageDir::init`] has been called.
    pub fn get() -> Option<&'static StorageDir> {
        PROCESS_STORAGE_DIR.get()
    }

    /// The path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `filename` inside the storage directory.
    pub fn join(&self, filename: impl AsRef<Path>) -> PathBuf {
        self.path.join(filename)
    }
}

impl AsRef<Path> for StorageDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}
