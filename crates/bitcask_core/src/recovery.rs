//! Startup recovery: rebuilds the keydir by replaying segments in order.
//!
//! A completed merge's hint file covers every segment below the
//! merge-finished threshold, so only segments at or above it need a full
//! byte-by-byte replay. Within the replayed range, records are grouped by
//! their transaction sequence; a group is only applied to the keydir once
//! its commit marker is seen, and any group still open when replay reaches
//! the end of the log is discarded as an incomplete batch. A record with
//! sequence 0 has no commit marker at all — that sequence is reserved for
//! merge output, already known live, and is applied to the keydir directly.

use crate::dir::DatabaseDir;
use crate::error::CoreResult;
use crate::hint::read_hint_file;
use crate::keydir::Keydir;
use crate::keyenc::{parse_prefixed_key, COMMIT_SENTINEL};
use crate::merge::read_merge_threshold;
use crate::segment::SegmentManager;
use crate::types::TxSeq;
use bitcask_codec::Position;
use std::collections::HashMap;
use tracing::{debug, info};

/// What replay discovered, needed to resume writing where the log left off.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryResult {
    /// The sequence number the next batch commit should use.
    pub next_tx_seq: TxSeq,
    /// Offset in the active segment immediately after the last record that
    /// decoded successfully; any bytes beyond this are discarded.
    pub active_tail_offset: u64,
}

struct PendingEntry {
    key: Vec<u8>,
    pos: Position,
    tombstone: bool,
}

/// Replays the log into `keydir` and returns where writing should resume.
pub fn recover(dir: &DatabaseDir, segments: &SegmentManager, keydir: &dyn Keydir) -> CoreResult<RecoveryResult> {
    let threshold = read_merge_threshold(dir)?;
    if let Some(threshold) = threshold {
        let entries = read_hint_file(&dir.hint_path())?;
        debug!(entries = entries.len(), threshold = threshold.as_u32(), "loaded hint file");
        for (key, pos) in entries {
            keydir.put(&key, pos);
        }
    }

    let active_id = segments.active_id();
    let mut staging: HashMap<TxSeq, Vec<PendingEntry>> = HashMap::new();
    let mut max_seq = TxSeq::NONE;
    let mut active_tail_offset = segments.active_write_offset();

    for file_id in segments.segment_ids() {
        if let Some(threshold) = threshold {
            if file_id < threshold {
                continue;
            }
        }

        let mut offset = 0u64;
        loop {
            let Some((record, len)) = segments.read_record_at(file_id, offset)? else {
                break;
            };
            let (seq, user_key) = parse_prefixed_key(&record.key)?;
            if seq > max_seq {
                max_seq = seq;
            }

            if seq == TxSeq::NONE {
                // Merge output: already-live records re-prefixed with
                // sequence 0 instead of a real batch sequence, so they have
                // no commit marker to wait for and apply straight away.
                let pos = Position::new(file_id.as_u32(), offset, len as u32);
                if record.tombstone {
                    keydir.delete(user_key);
                } else {
                    keydir.put(user_key, pos);
                }
            } else if user_key == COMMIT_SENTINEL {
                if let Some(batch) = staging.remove(&seq) {
                    for entry in batch {
                        if entry.tombstone {
                            keydir.delete(&entry.key);
                        } else {
                            keydir.put(&entry.key, entry.pos);
                        }
                    }
                }
            } else {
                let pos = Position::new(file_id.as_u32(), offset, len as u32);
                staging.entry(seq).or_default().push(PendingEntry {
                    key: user_key.to_vec(),
                    pos,
                    tombstone: record.tombstone,
                });
            }
            offset += len;
        }

        if file_id == active_id {
            active_tail_offset = offset;
        }
    }

    if !staging.is_empty() {
        debug!(incomplete_batches = staging.len(), "discarding batches without a commit marker");
    }

    info!(keys = keydir.len(), "recovery complete");
    Ok(RecoveryResult {
        next_tx_seq: max_seq.next(),
        active_tail_offset,
    })
}
