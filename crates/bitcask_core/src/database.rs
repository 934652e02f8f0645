//! The public database facade.

use crate::batch::{BatchContext, WriteBatch};
use crate::config::Options;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::keydir::{build, Keydir};
use crate::merge::{adopt_completed_merge, run_merge};
use crate::recovery::recover;
use crate::segment::{BackendFactory, SegmentManager};
use bitcask_storage::{FileBackend, StorageBackend};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

fn file_backend_factory() -> BackendFactory {
    Arc::new(|path: &Path| Ok(Box::new(FileBackend::open(path)?) as Box<dyn StorageBackend>))
}

/// Point-in-time counts describing a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of live keys in the keydir.
    pub key_count: usize,
    /// Number of open segment files, active included.
    pub segment_count: usize,
    /// Id of the active (writable) segment.
    pub active_segment: u32,
}

/// An open Bitcask-style key-value store.
///
/// Cloning a `Database` is cheap: every clone shares the same underlying
/// segments, keydir, and write serialization.
#[derive(Clone)]
pub struct Database {
    dir: Arc<DatabaseDir>,
    ctx: Arc<BatchContext>,
    options: Options,
    merge_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Opens a database at `path` with default options. Backed by real
    /// files on disk.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_options(path, Options::default())
    }

    /// Opens a database at `path` with the given options, using a real
    /// file-backed storage backend.
    pub fn open_with_options(path: impl AsRef<Path>, options: Options) -> CoreResult<Self> {
        Self::open_with_backend(path, options, file_backend_factory())
    }

    /// Opens a database with a caller-supplied storage backend factory, for
    /// example an in-memory backend in tests.
    pub fn open_with_backend(
        path: impl AsRef<Path>,
        options: Options,
        factory: BackendFactory,
    ) -> CoreResult<Self> {
        let path = path.as_ref();
        if options.error_if_exists && path.exists() {
            return Err(CoreError::DirInUse(path.to_path_buf()));
        }

        let dir = DatabaseDir::open(path, options.create_if_missing)?;
        adopt_completed_merge(&dir)?;
        let dir = Arc::new(dir);

        let segments = Arc::new(SegmentManager::open(
            dir.clone(),
            factory,
            options.data_file_size,
        )?);

        let keydir: Arc<dyn Keydir> = Arc::from(build(options.keydir_kind));
        let recovered = recover(&dir, &segments, keydir.as_ref())?;
        segments.finish_recovery(recovered.active_tail_offset)?;

        let ctx = Arc::new(BatchContext {
            segments,
            keydir,
            next_tx_seq: AtomicU64::new(recovered.next_tx_seq.as_u64() - 1),
            write_lock: Mutex::new(()),
            sync_on_put: options.sync_on_put,
            max_batch_records: options.max_batch_records,
        });

        info!(path = %path.display(), keys = ctx.keydir.len(), "database opened");
        Ok(Self {
            dir,
            ctx,
            options,
            merge_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Path of the open database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Inserts or overwrites `key` with `value`, committed as a
    /// single-record batch.
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let max = self.options.data_file_size;
        if value.len() as u64 > max {
            return Err(CoreError::value_too_large(value.len() as u64, max));
        }
        let batch = self.new_write_batch();
        batch.put(key, value)?;
        batch.commit()
    }

    /// Looks up the current value for `key`.
    pub fn get(&self, key: &[u8]) -> CoreResult<Vec<u8>> {
        let pos = self.ctx.keydir.get(key).ok_or(CoreError::NoRecord)?;
        let bytes = self
            .ctx
            .segments
            .read_at(crate::types::FileId::new(pos.file_id), pos.offset, pos.size as usize)?;
        let (record, _) = bitcask_codec::Record::decode(&bytes)?
            .ok_or_else(|| CoreError::corrupt_data_file(crate::types::FileId::new(pos.file_id), pos.offset))?;
        Ok(record.value)
    }

    /// Deletes `key`, committed as a single-record batch. A no-op if `key`
    /// has no live record.
    pub fn delete(&self, key: &[u8]) -> CoreResult<()> {
        let batch = self.new_write_batch();
        batch.delete(key)?;
        batch.commit()
    }

    /// Whether `key` currently has a live record.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.ctx.keydir.get(key).is_some()
    }

    /// Returns every live key, in ascending order.
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        self.ctx.keydir.iter().map(|(k, _)| k).collect()
    }

    /// Calls `f` with every live key and its current value, in ascending
    /// key order, stopping early if `f` returns `false`.
    pub fn fold<F>(&self, mut f: F) -> CoreResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        for (key, _) in self.ctx.keydir.iter() {
            let value = match self.get(&key) {
                Ok(v) => v,
                Err(CoreError::NoRecord) => continue,
                Err(e) => return Err(e),
            };
            if !f(&key, &value) {
                break;
            }
        }
        Ok(())
    }

    /// Creates a new, empty write batch sharing this database's log and
    /// keydir.
    #[must_use]
    pub fn new_write_batch(&self) -> WriteBatch {
        WriteBatch::new(self.ctx.clone())
    }

    /// Fsyncs the active segment immediately.
    pub fn sync(&self) -> CoreResult<()> {
        self.ctx.segments.sync_active(true)
    }

    /// Point-in-time counts for monitoring and the CLI `stats` command.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            key_count: self.ctx.keydir.len(),
            segment_count: self.ctx.segments.segment_ids().len(),
            active_segment: self.ctx.segments.active_id().as_u32(),
        }
    }

    /// Compacts the log: seals the active segment and copies every live
    /// record below it into a staging directory. The effect is only
    /// visible after the database is closed and reopened.
    ///
    /// Sealing the active segment happens under the same write lock that
    /// guards batch commits: the lock is released once the seal is done, so
    /// a merge can never fall between two appends of the same in-flight
    /// batch. Either the whole batch, commit marker included, lands before
    /// the seal and is merge-eligible, or the whole batch starts in the new
    /// active segment; the merge scan itself runs unlocked, concurrently
    /// with readers and writers on the new active segment.
    ///
    /// Returns an error if a merge is already running on this handle.
    pub fn merge(&self) -> CoreResult<()> {
        let _merge_guard = self
            .merge_lock
            .try_lock()
            .ok_or(CoreError::MergeInProgress)?;

        {
            let _write_guard = self.ctx.write_lock.lock();
            self.ctx.segments.force_rollover()?;
        }

        let factory = file_backend_factory();
        run_merge(
            &self.dir,
            &self.ctx.segments,
            self.ctx.keydir.as_ref(),
            &factory,
            self.options.data_file_size,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcask_storage::InMemoryBackend;
    use tempfile::tempdir;

    fn memory_factory() -> BackendFactory {
        Arc::new(|_path: &Path| Ok(Box::new(InMemoryBackend::new()) as Box<dyn StorageBackend>))
    }

    fn open(temp: &tempfile::TempDir, options: Options) -> Database {
        Database::open_with_backend(temp.path().join("db"), options, memory_factory()).unwrap()
    }

    #[test]
    fn put_get_overwrite() {
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        db.put(b"k", b"v1").unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"v1");
        db.put(b"k", b"v2").unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"v2");
    }

    #[test]
    fn delete_removes_key() {
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        db.put(b"k", b"v").unwrap();
        db.delete(b"k").unwrap();
        assert!(matches!(db.get(b"k"), Err(CoreError::NoRecord)));
        assert!(!db.contains_key(b"k"));
    }

    #[test]
    fn list_keys_is_sorted() {
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        db.put(b"b", b"1").unwrap();
        db.put(b"a", b"2").unwrap();
        assert_eq!(db.list_keys(), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn batch_is_atomic_and_visible_after_commit() {
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        let batch = db.new_write_batch();
        batch.put(b"a", b"1").unwrap();
        batch.put(b"b", b"2").unwrap();
        batch.commit().unwrap();
        assert_eq!(db.get(b"a").unwrap(), b"1");
        assert_eq!(db.get(b"b").unwrap(), b"2");
    }

    #[test]
    fn empty_key_is_rejected() {
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        assert!(matches!(db.put(b"", b"v"), Err(CoreError::EmptyKey)));
    }

    #[test]
    fn stats_reflects_live_keys() {
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        db.put(b"a", b"1").unwrap();
        db.put(b"b", b"2").unwrap();
        assert_eq!(db.stats().key_count, 2);
    }

    #[test]
    fn merge_waits_for_an_inflight_batch_commit() {
        // A batch commit holds ctx.write_lock across its whole append
        // sequence. merge() must block on that same lock before sealing the
        // active segment, or it could roll the log over between two appends
        // of the same batch and silently drop the earlier ones on compaction.
        let temp = tempdir().unwrap();
        let db = open(&temp, Options::default());
        db.put(b"a", b"1").unwrap();

        let guard = db.ctx.write_lock.lock();
        let db_for_merge = db.clone();
        let handle = std::thread::spawn(move || db_for_merge.merge());

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!handle.is_finished(), "merge must not proceed while a batch holds the write lock");

        drop(guard);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn merge_compacts_and_survives_reopen() {
        // Merge copies real files on disk, so this needs a real file backend
        // rather than the in-memory one the other tests use.
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        let options = Options::default();

        let db = Database::open_with_options(&path, options.clone()).unwrap();
        db.put(b"a", b"1").unwrap();
        db.put(b"b", b"2").unwrap();
        db.put(b"a", b"1-updated").unwrap();
        db.delete(b"b").unwrap();
        db.merge().unwrap();
        drop(db);

        let reopened = Database::open_with_options(&path, options).unwrap();
        assert_eq!(reopened.get(b"a").unwrap(), b"1-updated");
        assert!(matches!(reopened.get(b"b"), Err(CoreError::NoRecord)));
        assert_eq!(reopened.list_keys(), vec![b"a".to_vec()]);
    }

    #[test]
    fn keys_survive_a_second_merge_of_already_compacted_output() {
        // Merge re-appends live records with their key re-prefixed to
        // sequence 0 rather than stripped outright, so a later merge that
        // scans an already-compacted segment can still parse its keys.
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        let options = Options::default();

        let db = Database::open_with_options(&path, options.clone()).unwrap();
        db.put(b"hello", b"v1").unwrap();
        db.merge().unwrap();
        drop(db);

        let db = Database::open_with_options(&path, options.clone()).unwrap();
        assert_eq!(db.get(b"hello").unwrap(), b"v1");
        db.put(b"other", b"v2").unwrap();
        db.merge().unwrap();
        drop(db);

        let reopened = Database::open_with_options(&path, options).unwrap();
        assert_eq!(reopened.get(b"hello").unwrap(), b"v1");
        assert_eq!(reopened.get(b"other").unwrap(), b"v2");
        assert_eq!(reopened.list_keys(), vec![b"hello".to_vec(), b"other".to_vec()]);
    }
}
