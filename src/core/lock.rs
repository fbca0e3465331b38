use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::platform::sys;
use crate::{Error, Result};

/// An exclusive whole-file lock held until drop.
///
/// Each guard opens its own file description, so threads of one process
/// exclude each other just like separate processes do. The OS drops the lock
/// if the holder dies.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Blocks until the lock on `path` is held. The file is created on
    /// demand but its directory is not.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        sys::lock_exclusive(&file).map_err(|source| Error::LockUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Returns `None` when another holder has the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        let locked = sys::try_lock_exclusive(&file).map_err(|source| Error::LockUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        if !locked {
            return Ok(None);
        }
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = sys::unlock(&self.file) {
            // Closing the descriptor below releases it anyway.
            log::debug!("unlock {} failed: {err}", self.path.display());
        }
    }
}

/// Runs `body` while holding the lock on `path`.
pub fn with_lock<T>(path: &Path, body: impl FnOnce() -> T) -> Result<T> {
    let _guard = FileLock::acquire(path)?;
    Ok(body())
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| Error::LockUnavailable {
            path: path.to_path_buf(),
            source,
        })
}
