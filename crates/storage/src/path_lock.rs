//! Path-scoped advisory locks.
//!
//! The lock for `target` is an exclusive `fs4` lock on the sibling file
//! `{target}.lock`. It serializes evict and publish of one canonical path
//! across threads and processes; it is never held across a network transfer.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::FileExt;
use tracing::trace;

use crate::error::{StorageError, StorageResult};

/// Held exclusive lock; released on drop.
#[derive(Debug)]
pub struct PathLock {
    file: File,
    path: PathBuf,
}

/// Lock file guarding `target`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

fn open_lock_file(path: &Path) -> StorageResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| StorageError::Lock {
            path: path.to_path_buf(),
            source,
        })
}

impl PathLock {
    /// Block until the lock guarding `target` is held.
    ///
    /// Blocking; async callers should acquire it inside `spawn_blocking`.
    pub fn acquire(target: &Path) -> StorageResult<Self> {
        let path = lock_path_for(target);
        let file = open_lock_file(&path)?;
        file.lock_exclusive().map_err(|source| StorageError::Lock {
            path: path.clone(),
            source,
        })?;
        trace!(path = %path.display(), "Acquired path lock");
        Ok(Self { file, path })
    }

    /// Take the lock if nobody else holds it.
    pub fn try_acquire(target: &Path) -> StorageResult<Option<Self>> {
        let path = lock_path_for(target);
        let file = open_lock_file(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(StorageError::Lock { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.path.display(), "Released path lock");
    }
}
