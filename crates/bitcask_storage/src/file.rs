//! File-based storage backend: one open `File` per segment.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A segment file backed by a real `File` handle.
///
/// `SegmentManager::open` constructs one of these per segment id it finds on
/// disk, and the active segment always has exactly one. Appends go through a
/// single cached `size`, so a reader never has to stat the file to learn
/// where the next write will land; that value is what the keydir and the
/// batch engine record as a `Position`'s offset.
///
/// # Durability
///
/// - `flush()` calls `File::flush()`, pushing buffered writes to the OS
///   but giving no guarantee they survive a crash
/// - `sync()` calls `File::sync_all()`, which is what a committed batch with
///   `sync_on_put` (or an explicit `Database::sync`) actually waits on
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads; the
/// segment manager reads an immutable segment from multiple threads while a
/// merge and ordinary `get`s both run.
///
/// # Example
///
/// ```no_run
/// use bitcask_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut segment = FileBackend::open(Path::new("000000000.cq")).unwrap();
/// let offset = segment.append(&[0u8; 4]).unwrap(); // pretend this is an encoded record
/// segment.sync().unwrap(); // durable before the commit marker's append returns
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens the segment file at `path`, creating it if this is a brand new
    /// segment id.
    ///
    /// An existing file is opened at its current length and resumes
    /// appending there — reopening a database never truncates an active
    /// segment on its own; only recovery does, after replay finds a
    /// partial trailing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Opens or creates the segment file at `path`, creating the database
    /// directory first if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the segment file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, *size
                ),
            )));
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}
