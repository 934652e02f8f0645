//! Database directory layout and locking.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK                    # advisory single-writer lock
//! ├─ 000000000.cq            # immutable segment
//! ├─ 000000001.cq            # active segment
//! ├─ cqkv.hint                 # hint file written by the last merge
//! └─ cqkv-merge-finished       # merge completion marker
//!
//! <db_path>-cqkv-merge/        # staging directory used while merging
//! ```
//!
//! The on-disk names above are a fixed, load-bearing format: an older
//! database must remain readable after upgrading the code that wrote it.

use crate::error::{CoreError, CoreResult};
use crate::types::FileId;
use bitcask_storage::DirLock;
use std::fs;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
pub(crate) const DATA_FILE_SUFFIX: &str = ".cq";
pub(crate) const HINT_FILE_NAME: &str = "cqkv.hint";
pub(crate) const MERGE_FINISHED_FILE_NAME: &str = "cqkv-merge-finished";
const MERGE_DIR_SUFFIX: &str = "-cqkv-merge";

/// File name for a segment with the given id, independent of which
/// directory (live or merge staging) it lives in.
#[must_use]
pub(crate) fn segment_file_name(file_id: FileId) -> String {
    format!("{:09}{DATA_FILE_SUFFIX}", file_id.as_u32())
}

/// Owns the database directory and holds its advisory lock for as long as
/// the database is open.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock: DirLock,
}

impl DatabaseDir {
    /// Opens (creating if requested) and locks a database directory.
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::DirNotFound(path.to_path_buf()));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::DirNotFound(path.to_path_buf()));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock = DirLock::try_acquire(&lock_path)?
            .ok_or_else(|| CoreError::DirInUse(path.to_path_buf()))?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Root directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to a data segment with the given file id.
    #[must_use]
    pub fn segment_path(&self, file_id: FileId) -> PathBuf {
        self.path.join(segment_file_name(file_id))
    }

    /// Path to the hint file produced by the last successful merge.
    #[must_use]
    pub fn hint_path(&self) -> PathBuf {
        self.path.join(HINT_FILE_NAME)
    }

    /// Path to the merge-finished marker.
    #[must_use]
    pub fn merge_finished_path(&self) -> PathBuf {
        self.path.join(MERGE_FINISHED_FILE_NAME)
    }

    /// Path to the staging directory used while a merge is running, sibling
    /// to the database directory itself.
    #[must_use]
    pub fn merge_staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| format!("{}{MERGE_DIR_SUFFIX}", n.to_string_lossy()))
            .unwrap_or_else(|| MERGE_DIR_SUFFIX.to_string());
        self.path
            .parent()
            .map(|p| p.join(&name))
            .unwrap_or_else(|| PathBuf::from(&name))
    }

    /// Lists the ids of every `.cq` segment currently present, in ascending
    /// order.
    pub fn list_segment_ids(&self) -> CoreResult<Vec<FileId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(DATA_FILE_SUFFIX) {
                if let Ok(id) = stem.parse::<u32>() {
                    ids.push(FileId::new(id));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Fsyncs the directory itself so that file creation/rename/removal
    /// within it is durable. A no-op on platforms without directory fsync.
    #[cfg(unix)]
    pub fn sync(&self) -> CoreResult<()> {
        let dir = fs::File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn sync(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("new_db");
        assert!(!db_path.exists());
        let dir = DatabaseDir::open(&db_path, true).unwrap();
        assert!(db_path.is_dir());
        drop(dir);
    }

    #[test]
    fn open_fails_if_missing_and_no_create() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("nope");
        assert!(matches!(
            DatabaseDir::open(&db_path, false),
            Err(CoreError::DirNotFound(_))
        ));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("locked");
        let _first = DatabaseDir::open(&db_path, true).unwrap();
        assert!(matches!(
            DatabaseDir::open(&db_path, true),
            Err(CoreError::DirInUse(_))
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("reopen");
        {
            let _dir = DatabaseDir::open(&db_path, true).unwrap();
        }
        let _dir2 = DatabaseDir::open(&db_path, true).unwrap();
    }

    #[test]
    fn segment_path_is_zero_padded() {
        let temp = tempdir().unwrap();
        let dir = DatabaseDir::open(&temp.path().join("db"), true).unwrap();
        assert_eq!(
            dir.segment_path(FileId::new(7)).file_name().unwrap(),
            "000000007.cq"
        );
    }

    #[test]
    fn list_segment_ids_sorted() {
        let temp = tempdir().unwrap();
        let dir = DatabaseDir::open(&temp.path().join("db"), true).unwrap();
        fs::write(dir.segment_path(FileId::new(2)), []).unwrap();
        fs::write(dir.segment_path(FileId::new(0)), []).unwrap();
        fs::write(dir.segment_path(FileId::new(1)), []).unwrap();
        let ids = dir.list_segment_ids().unwrap();
        assert_eq!(ids, vec![FileId::new(0), FileId::new(1), FileId::new(2)]);
    }

    #[test]
    fn merge_staging_path_is_sibling() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("mydb");
        let dir = DatabaseDir::open(&db_path, true).unwrap();
        let staging = dir.merge_staging_path();
        assert_eq!(staging, temp.path().join("mydb-cqkv-merge"));
    }
}
