//! Merge (compaction) engine.
//!
//! A merge never touches the live database directory directly. The caller
//! seals the current active segment under the write lock first (so the
//! merge threshold never splits an in-flight batch across two segments);
//! [`run_merge`] then copies every still-live record below that threshold
//! into a sibling staging directory, writes a hint file and a
//! merge-finished marker there, and stops — all without the write lock
//! held, concurrently with ordinary reads and writes. The staging directory
//! is only adopted into the live directory the next time the database is
//! opened — see [`adopt_completed_merge`] — so a crash mid-merge never
//! corrupts a running database: the live directory is untouched until the
//! swap, and the swap itself moves files in before removing the staging
//! directory, never the other way around.

use crate::dir::{
    segment_file_name, DatabaseDir, DATA_FILE_SUFFIX, HINT_FILE_NAME, MERGE_FINISHED_FILE_NAME,
};
use crate::error::CoreResult;
use crate::hint::write_hint_file;
use crate::keydir::Keydir;
use crate::keyenc::{parse_prefixed_key, prefix_key, COMMIT_SENTINEL};
use crate::segment::{BackendFactory, SegmentManager};
use crate::types::{FileId, TxSeq};
use bitcask_codec::{Position, Record};
use bitcask_storage::StorageBackend;
use std::fs;
use std::path::Path;
use tracing::info;

/// Outcome of a completed merge run.
#[derive(Debug, Clone, Copy)]
pub struct MergeOutcome {
    /// Number of compacted segments written to the staging directory.
    pub segments_written: usize,
    /// Smallest segment id that was *not* merged. Adopted as the
    /// merge-finished marker.
    pub threshold: FileId,
}

fn staging_segment_path(staging_root: &Path, id: FileId) -> std::path::PathBuf {
    staging_root.join(segment_file_name(id))
}

/// Runs a merge: copies every record below `segments`'s current active
/// segment that is still live into a fresh staging directory, and marks it
/// finished. Visible effects require a subsequent reopen, see
/// [`adopt_completed_merge`].
///
/// The caller is responsible for sealing the active segment (demoting it to
/// immutable and opening a fresh one) under the write lock before calling
/// this, per the merge protocol: the write lock is held only long enough to
/// pick the merge threshold, not for the whole scan below.
pub fn run_merge(
    dir: &DatabaseDir,
    segments: &SegmentManager,
    keydir: &dyn Keydir,
    factory: &BackendFactory,
    max_segment_size: u64,
) -> CoreResult<MergeOutcome> {
    let threshold = segments.active_id();
    let merge_ids: Vec<FileId> = segments
        .segment_ids()
        .into_iter()
        .filter(|id| *id < threshold)
        .collect();

    let staging_path = dir.merge_staging_path();
    if staging_path.exists() {
        fs::remove_dir_all(&staging_path)?;
    }
    fs::create_dir_all(&staging_path)?;

    if merge_ids.is_empty() {
        write_hint_file(&staging_path.join(HINT_FILE_NAME), &[])?;
        fs::write(
            staging_path.join(MERGE_FINISHED_FILE_NAME),
            threshold.as_u32().to_string(),
        )?;
        info!(segments_written = 0, threshold = threshold.as_u32(), "merge staged");
        return Ok(MergeOutcome {
            segments_written: 0,
            threshold,
        });
    }

    let mut hint_entries = Vec::new();
    let mut out_id = FileId::new(0);
    let mut out_backend: Option<Box<dyn StorageBackend>> = None;
    let mut out_offset = 0u64;

    for file_id in merge_ids {
        let mut offset = 0u64;
        loop {
            let Some((record, len)) = segments.read_record_at(file_id, offset)? else {
                break;
            };
            let (_, user_key) = parse_prefixed_key(&record.key)?;
            if user_key != COMMIT_SENTINEL && !record.tombstone {
                let on_disk = Position::new(file_id.as_u32(), offset, len as u32);
                if keydir.get(user_key) == Some(on_disk) {
                    // Reset to tx-seq 0, not stripped: every on-disk key still
                    // carries the uvarint prefix recovery and a later merge
                    // expect, just tagged as already-committed rather than
                    // belonging to any particular batch.
                    let out_key = prefix_key(TxSeq::NONE, user_key);
                    let out_record = Record::put(out_key, record.value.clone());
                    let bytes = out_record.encode();
                    if out_offset > 0 && out_offset + bytes.len() as u64 > max_segment_size {
                        if let Some(backend) = out_backend.as_mut() {
                            backend.sync()?;
                        }
                        out_id = out_id.next();
                        out_backend = None;
                        out_offset = 0;
                    }
                    if out_backend.is_none() {
                        out_backend = Some(factory(&staging_segment_path(&staging_path, out_id))?);
                    }
                    let backend = out_backend.as_mut().expect("backend just initialized above");
                    let written_at = backend.append(&bytes)?;
                    out_offset = written_at + bytes.len() as u64;
                    hint_entries.push((
                        user_key.to_vec(),
                        Position::new(out_id.as_u32(), written_at, bytes.len() as u32),
                    ));
                }
            }
            offset += len;
        }
    }
    let segments_written = if let Some(mut backend) = out_backend {
        backend.sync()?;
        out_id.as_u32() as usize + 1
    } else {
        0
    };

    write_hint_file(&staging_path.join(HINT_FILE_NAME), &hint_entries)?;
    fs::write(
        staging_path.join(MERGE_FINISHED_FILE_NAME),
        threshold.as_u32().to_string(),
    )?;

    info!(segments_written, threshold = threshold.as_u32(), "merge staged");
    Ok(MergeOutcome {
        segments_written,
        threshold,
    })
}

/// Adopts a completed merge's staging directory into the live database
/// directory, if one is present. Runs once, before segments are opened, at
/// the start of every `Database::open`.
///
/// If the staging directory exists but has no finished marker, the merge
/// never completed and the staging directory is discarded without touching
/// the live directory. If it has a marker, the compacted segments, hint
/// file, and marker are copied into the live directory (overwriting any
/// segment ids below the threshold) and the now-redundant higher ids in
/// `0..threshold` with no compacted replacement are removed. The staging
/// directory is only deleted after every file has been copied in.
pub fn adopt_completed_merge(dir: &DatabaseDir) -> CoreResult<()> {
    let staging_path = dir.merge_staging_path();
    if !staging_path.exists() {
        return Ok(());
    }

    let marker_path = staging_path.join(MERGE_FINISHED_FILE_NAME);
    if !marker_path.exists() {
        info!("discarding incomplete merge staging directory");
        fs::remove_dir_all(&staging_path)?;
        return Ok(());
    }

    let threshold = read_threshold(&marker_path)?;

    let mut staged_ids = Vec::new();
    for entry in fs::read_dir(&staging_path)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name.strip_suffix(DATA_FILE_SUFFIX) {
            if let Ok(id) = stem.parse::<u32>() {
                staged_ids.push(FileId::new(id));
            }
        }
    }

    for &id in &staged_ids {
        fs::copy(staging_segment_path(&staging_path, id), dir.segment_path(id))?;
    }
    fs::copy(staging_path.join(HINT_FILE_NAME), dir.hint_path())?;
    fs::copy(marker_path, dir.merge_finished_path())?;
    dir.sync()?;

    for old_id in dir.list_segment_ids()? {
        if old_id < threshold && !staged_ids.contains(&old_id) {
            fs::remove_file(dir.segment_path(old_id))?;
        }
    }

    fs::remove_dir_all(&staging_path)?;
    info!(threshold = threshold.as_u32(), "adopted completed merge");
    Ok(())
}

/// Reads the merge-finished marker in the live directory, if any, returning
/// the smallest segment id that was *not* covered by the last merge.
pub fn read_merge_threshold(dir: &DatabaseDir) -> CoreResult<Option<FileId>> {
    let path = dir.merge_finished_path();
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_threshold(&path)?))
}

fn read_threshold(path: &Path) -> CoreResult<FileId> {
    let text = fs::read_to_string(path)?;
    let id: u32 = text
        .trim()
        .parse()
        .map_err(|_| crate::error::CoreError::InvalidMergeFinishedFile)?;
    Ok(FileId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keydir::build;
    use crate::keyenc::prefix_key;
    use crate::types::TxSeq;
    use bitcask_storage::FileBackend;
    use std::sync::Arc;

    fn file_factory() -> BackendFactory {
        Arc::new(|path: &Path| Ok(Box::new(FileBackend::open(path)?) as Box<dyn StorageBackend>))
    }

    fn write_committed(segments: &SegmentManager, seq: u64, key: &[u8], value: &[u8]) {
        let seq = TxSeq::new(seq);
        segments
            .append(&Record::put(prefix_key(seq, key), value.to_vec()).encode())
            .unwrap();
        segments
            .append(&Record::put(prefix_key(seq, COMMIT_SENTINEL), Vec::new()).encode())
            .unwrap();
    }

    #[test]
    fn run_merge_keeps_only_what_the_keydir_says_is_live() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Arc::new(DatabaseDir::open(&temp.path().join("db"), true).unwrap());
        let segments = SegmentManager::open(dir.clone(), file_factory(), 4096).unwrap();

        // "a" is overwritten, so its first record (seq 1) ends up stale;
        // only the seq-3 overwrite and "b" are live.
        write_committed(&segments, 1, b"a", b"1");
        write_committed(&segments, 2, b"b", b"2");
        write_committed(&segments, 3, b"a", b"1-updated");

        let keydir = build(crate::config::KeydirKind::default());
        let mut offset = 0u64;
        loop {
            let Some((record, n)) = segments.read_record_at(FileId::new(0), offset).unwrap() else {
                break;
            };
            let (_, user_key) = parse_prefixed_key(&record.key).unwrap();
            if user_key != COMMIT_SENTINEL {
                keydir.put(user_key, Position::new(0, offset, n as u32));
            }
            offset += n;
        }

        segments.force_rollover().unwrap();
        let factory = file_factory();
        let outcome = run_merge(&dir, &segments, keydir.as_ref(), &factory, 4096).unwrap();
        assert_eq!(outcome.threshold, FileId::new(1));
        assert_eq!(outcome.segments_written, 1);

        let staging = dir.merge_staging_path();
        let hint_entries = crate::hint::read_hint_file(&staging.join(HINT_FILE_NAME)).unwrap();
        let mut keys: Vec<_> = hint_entries.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn adopt_completed_merge_discards_staging_without_marker() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("db");
        let dir = DatabaseDir::open(&db_path, true).unwrap();
        let staging = dir.merge_staging_path();
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("garbage"), b"incomplete").unwrap();

        adopt_completed_merge(&dir).unwrap();
        assert!(!staging.exists());
    }

    #[test]
    fn adopt_completed_merge_is_a_noop_without_staging() {
        let temp = tempfile::tempdir().unwrap();
        let dir = DatabaseDir::open(&temp.path().join("db"), true).unwrap();
        assert!(adopt_completed_merge(&dir).is_ok());
    }
}
