//! Atomic write batches.
//!
//! A batch buffers puts and deletes in memory and only touches the log on
//! [`WriteBatch::commit`]: every buffered record is assigned the same
//! transaction sequence, appended with that sequence prefixed onto its key,
//! followed by a commit-marker record carrying the same sequence. Only once
//! that marker is durable does the batch update the keydir. A bare
//! [`crate::Database::put`]/[`crate::Database::delete`] is implemented as a
//! single-record batch, so every key on disk carries a sequence prefix.

use crate::error::{CoreError, CoreResult};
use crate::keydir::Keydir;
use crate::keyenc::{prefix_key, validate_key, COMMIT_SENTINEL};
use crate::segment::SegmentManager;
use crate::types::TxSeq;
use bitcask_codec::{Position, Record};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct PendingWrite {
    value: Vec<u8>,
    tombstone: bool,
}

/// Shared state a batch needs to commit: the segment log, the keydir it
/// updates, and the sequence counter and write lock both a bare put/delete
/// and an explicit batch share.
pub(crate) struct BatchContext {
    pub segments: Arc<SegmentManager>,
    pub keydir: Arc<dyn Keydir>,
    pub next_tx_seq: AtomicU64,
    pub write_lock: Mutex<()>,
    pub sync_on_put: bool,
    pub max_batch_records: usize,
}

impl BatchContext {
    fn next_seq(&self) -> TxSeq {
        TxSeq::new(self.next_tx_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// A buffered set of puts/deletes committed atomically.
pub struct WriteBatch {
    ctx: Arc<BatchContext>,
    pending: Mutex<HashMap<Vec<u8>, PendingWrite>>,
}

impl WriteBatch {
    pub(crate) fn new(ctx: Arc<BatchContext>) -> Self {
        Self {
            ctx,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Buffers a put. Visible only after [`commit`](Self::commit).
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        validate_key(key)?;
        self.pending.lock().insert(
            key.to_vec(),
            PendingWrite {
                value: value.to_vec(),
                tombstone: false,
            },
        );
        Ok(())
    }

    /// Buffers a delete. If `key` has no live record and no pending put in
    /// this batch, this is a no-op: there is nothing to delete and no
    /// tombstone is written. If `key` has a pending put in this batch, that
    /// put is dropped instead of writing a tombstone for a key that was
    /// never durable.
    pub fn delete(&self, key: &[u8]) -> CoreResult<()> {
        validate_key(key)?;
        let mut pending = self.pending.lock();
        if self.ctx.keydir.get(key).is_none() {
            pending.remove(key);
            return Ok(());
        }
        pending.insert(
            key.to_vec(),
            PendingWrite {
                value: Vec::new(),
                tombstone: true,
            },
        );
        Ok(())
    }

    /// Number of buffered writes not yet committed.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether there is nothing buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durably appends every buffered write plus a commit marker, then
    /// updates the keydir. Does nothing if nothing is buffered.
    pub fn commit(&self) -> CoreResult<()> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(());
        }
        if pending.len() > self.ctx.max_batch_records {
            return Err(CoreError::batch_too_large(self.ctx.max_batch_records));
        }

        let _write_guard = self.ctx.write_lock.lock();
        let seq = self.ctx.next_seq();

        let mut positions = HashMap::with_capacity(pending.len());
        for (key, write) in pending.iter() {
            let on_disk_key = prefix_key(seq, key);
            let record = Record {
                key: on_disk_key,
                value: write.value.clone(),
                tombstone: write.tombstone,
            };
            let bytes = record.encode();
            let (file_id, offset) = self.ctx.segments.append(&bytes)?;
            positions.insert(key.clone(), Position::new(file_id.as_u32(), offset, bytes.len() as u32));
        }

        let finish_key = prefix_key(seq, COMMIT_SENTINEL);
        self.ctx
            .segments
            .append(&Record::put(finish_key, Vec::new()).encode())?;

        if self.ctx.sync_on_put {
            self.ctx.segments.sync_active(true)?;
        }

        for (key, write) in pending.iter() {
            if write.tombstone {
                self.ctx.keydir.delete(key);
            } else {
                let pos = positions[key];
                self.ctx.keydir.put(key, pos);
            }
        }

        pending.clear();
        Ok(())
    }
}
