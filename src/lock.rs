//! Advisory cross-process lock for multi-file state changes.
//!
//! The atomic primitives take no locks. Callers that may race with another
//! process on the same state files hold a [`StateLock`] around their
//! transaction. The lock is an OS-level exclusive lock on a well-known file,
//! acquired without blocking and released on drop.

use crate::error::{Result, StateError};

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// An exclusive lock on a state lock file.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    file: File,
}

impl StateLock {
    /// Acquires the lock at `path`, creating the lock file if needed.
    ///
    /// Fails with [`StateError::Locked`] if another process holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    StateError::ParentDirectoryMissing(crate::fs::atomic::parent_dir(&path).into())
                }
                _ => StateError::io(&path, e),
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Acquired lock: {}", path.display());
                Ok(Self { path, file })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(StateError::Locked(path)),
            Err(e) => Err(StateError::io(&path, e)),
        }
    }

    /// Like [`acquire`](Self::acquire), but returns `None` if the lock is held.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(StateError::Locked(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
