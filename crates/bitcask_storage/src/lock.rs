//! Advisory exclusive lock over a database directory.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Holds an advisory exclusive lock on a `LOCK` file inside a database
/// directory, for the lifetime of the value. Dropping it releases the lock.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    file: File,
}

impl DirLock {
    /// Attempts to acquire the lock file at `lock_path`, creating it if
    /// necessary. Returns `Ok(None)` if another process already holds it.
    pub fn try_acquire(lock_path: &Path) -> StorageResult<Option<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: lock_path.to_path_buf(),
                file,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Path to the underlying lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("LOCK");
        let first = DirLock::try_acquire(&lock_path).unwrap();
        assert!(first.is_some());
        let second = DirLock::try_acquire(&lock_path).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("LOCK");
        {
            let _first = DirLock::try_acquire(&lock_path).unwrap().unwrap();
        }
        let second = DirLock::try_acquire(&lock_path).unwrap();
        assert!(second.is_some());
    }
}
