//! Active/immutable segment set with size-driven rollover.

use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::types::FileId;
use bitcask_codec::{CodecError, Record, MAX_HEADER_SIZE};
use bitcask_storage::StorageBackend;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Opens a storage backend for a segment file path. Pluggable so callers can
/// swap in an in-memory backend for tests or a different file implementation
/// in production, without `SegmentManager` knowing which.
pub type BackendFactory =
    Arc<dyn Fn(&Path) -> CoreResult<Box<dyn StorageBackend>> + Send + Sync>;

struct ActiveSegment {
    id: FileId,
    backend: Box<dyn StorageBackend>,
    write_offset: u64,
    writes_since_sync: u64,
}

/// Owns every open segment file backend for one database directory: exactly
/// one active (writable) segment, and zero or more immutable ones.
pub struct SegmentManager {
    dir: Arc<DatabaseDir>,
    factory: BackendFactory,
    max_segment_size: u64,
    active: RwLock<ActiveSegment>,
    immutable: RwLock<BTreeMap<FileId, Box<dyn StorageBackend>>>,
}

impl SegmentManager {
    /// Opens every existing segment under `dir`. The highest-numbered
    /// segment becomes active (resuming at its current size); if none exist,
    /// segment `0` is created fresh. This mirrors how the original log
    /// recovers: nothing forces a rollover just because the database was
    /// reopened.
    pub fn open(
        dir: Arc<DatabaseDir>,
        factory: BackendFactory,
        max_segment_size: u64,
    ) -> CoreResult<Self> {
        let ids = dir.list_segment_ids()?;
        let mut immutable = BTreeMap::new();

        let active_id = match ids.last() {
            Some(&id) => id,
            None => FileId::new(0),
        };

        for &id in &ids {
            if id == active_id {
                continue;
            }
            let backend = factory(&dir.segment_path(id))?;
            immutable.insert(id, backend);
        }

        let mut active_backend = factory(&dir.segment_path(active_id))?;
        let write_offset = active_backend.size()?;

        info!(segment = active_id.as_u32(), write_offset, "opened active segment");

        Ok(Self {
            dir,
            factory,
            max_segment_size,
            active: RwLock::new(ActiveSegment {
                id: active_id,
                backend: active_backend,
                write_offset,
                writes_since_sync: 0,
            }),
            immutable: RwLock::new(immutable),
        })
    }

    /// Id of the currently active segment.
    pub fn active_id(&self) -> FileId {
        self.active.read().id
    }

    /// Current write offset of the active segment.
    pub fn active_write_offset(&self) -> u64 {
        self.active.read().write_offset
    }

    /// Every segment id currently open, active last.
    pub fn segment_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.immutable.read().keys().copied().collect();
        ids.push(self.active_id());
        ids
    }

    /// Appends raw record bytes to the active segment, rolling over first if
    /// the write would exceed `max_segment_size`. Returns the file id and
    /// offset the record was written at.
    pub fn append(&self, record_bytes: &[u8]) -> CoreResult<(FileId, u64)> {
        let mut active = self.active.write();
        if active.write_offset > 0
            && active.write_offset + record_bytes.len() as u64 > self.max_segment_size
        {
            self.rollover(&mut active)?;
        }
        let offset = active.backend.append(record_bytes)?;
        active.write_offset = offset + record_bytes.len() as u64;
        active.writes_since_sync += 1;
        Ok((active.id, offset))
    }

    /// Forces a rollover regardless of size, used by the merge engine when
    /// demoting the active segment before a merge snapshot.
    pub fn force_rollover(&self) -> CoreResult<()> {
        let mut active = self.active.write();
        self.rollover(&mut active)
    }

    fn rollover(&self, active: &mut ActiveSegment) -> CoreResult<()> {
        active.backend.sync()?;
        let next_id = active.id.next();
        debug!(from = active.id.as_u32(), to = next_id.as_u32(), "segment rollover");
        let new_backend = (self.factory)(&self.dir.segment_path(next_id))?;
        let sealed_id = active.id;
        let sealed_backend = std::mem::replace(&mut active.backend, new_backend);
        self.immutable.write().insert(sealed_id, sealed_backend);
        active.id = next_id;
        active.write_offset = 0;
        active.writes_since_sync = 0;
        Ok(())
    }

    /// Syncs the active segment if `force` or at least one write has
    /// happened since the last sync.
    pub fn sync_active(&self, force: bool) -> CoreResult<()> {
        let mut active = self.active.write();
        if force || active.writes_since_sync > 0 {
            active.backend.sync()?;
            active.writes_since_sync = 0;
        }
        Ok(())
    }

    /// Drops any bytes in the active segment past `offset` and pins the
    /// write cursor there. Called once after replay to discard a trailing
    /// partial record left by a writer that crashed mid-append.
    pub fn finish_recovery(&self, offset: u64) -> CoreResult<()> {
        let mut active = self.active.write();
        if active.write_offset != offset {
            active.backend.truncate(offset)?;
            active.write_offset = offset;
        }
        Ok(())
    }

    /// Reads exactly `len` bytes at `offset` from the given segment.
    pub fn read_at(&self, file_id: FileId, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        let active = self.active.read();
        if active.id == file_id {
            return Ok(active.backend.read_at(offset, len)?);
        }
        drop(active);
        let immutable = self.immutable.read();
        let backend = immutable
            .get(&file_id)
            .ok_or(CoreError::NoDataFile(file_id))?;
        Ok(backend.read_at(offset, len)?)
    }

    fn segment_size(&self, file_id: FileId) -> CoreResult<u64> {
        let active = self.active.read();
        if active.id == file_id {
            return Ok(active.write_offset);
        }
        drop(active);
        let immutable = self.immutable.read();
        let backend = immutable
            .get(&file_id)
            .ok_or(CoreError::NoDataFile(file_id))?;
        Ok(backend.size()?)
    }

    /// Reads and decodes a single record at `(file_id, offset)`.
    ///
    /// Returns `Ok(None)` when nothing more can be decoded at this position:
    /// either the zero-padding end-of-segment sentinel, or a truncated tail
    /// left behind by a writer that crashed mid-record.
    pub fn read_record_at(
        &self,
        file_id: FileId,
        offset: u64,
    ) -> CoreResult<Option<(Record, u64)>> {
        let size = self.segment_size(file_id)?;
        if offset >= size {
            return Ok(None);
        }
        let available = (size - offset) as usize;
        let first_len = MAX_HEADER_SIZE.min(available);
        let prefix = self.read_at(file_id, offset, first_len)?;

        match Record::decode(&prefix) {
            Ok(None) => Ok(None),
            Ok(Some((record, n))) => Ok(Some((record, n as u64))),
            Err(CodecError::ShortBody { needed, .. }) => {
                if needed > available {
                    // Trailing bytes promise more than the segment actually
                    // holds: a writer crashed mid-record.
                    return Ok(None);
                }
                let full = self.read_at(file_id, offset, needed)?;
                match Record::decode(&full)? {
                    Some((record, n)) => Ok(Some((record, n as u64))),
                    None => Ok(None),
                }
            }
            Err(CodecError::ShortHeader { .. }) => Ok(None),
            Err(e) => Err(CoreError::bad_crc(file_id, e)),
        }
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

    fn open_manager(max_segment_size: u64) -> (tempfile::TempDir, SegmentManager) {
        let temp = tempdir().unwrap();
        let dir = Arc::new(DatabaseDir::open(&temp.path().join("db"), true).unwrap());
        let mgr = SegmentManager::open(dir, memory_factory(), max_segment_size).unwrap();
        (temp, mgr)
    }

    #[test]
    fn fresh_database_starts_at_segment_zero() {
        let (_temp, mgr) = open_manager(1024);
        assert_eq!(mgr.active_id(), FileId::new(0));
        assert_eq!(mgr.active_write_offset(), 0);
    }

    #[test]
    fn append_and_read_roundtrip() {
        let (_temp, mgr) = open_manager(1024);
        let record = Record::put(b"k".to_vec(), b"v".to_vec());
        let bytes = record.encode();
        let (file_id, offset) = mgr.append(&bytes).unwrap();
        let (decoded, _) = mgr.read_record_at(file_id, offset).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn rollover_on_size_threshold() {
        let record = Record::put(vec![1; 10], vec![2; 10]);
        let bytes = record.encode();
        let (_temp, mgr) = open_manager(bytes.len() as u64);

        let (first_id, _) = mgr.append(&bytes).unwrap();
        let (second_id, _) = mgr.append(&bytes).unwrap();

        assert_eq!(first_id, FileId::new(0));
        assert_eq!(second_id, FileId::new(1));
        assert_eq!(mgr.segment_ids(), vec![FileId::new(0), FileId::new(1)]);
    }

    #[test]
    fn read_past_written_data_is_none() {
        let (_temp, mgr) = open_manager(1024);
        let record = Record::put(b"k".to_vec(), b"v".to_vec());
        let (file_id, offset) = mgr.append(&record.encode()).unwrap();
        let next = offset + record.encoded_len() as u64;
        assert!(mgr.read_record_at(file_id, next).unwrap().is_none());
    }
}
