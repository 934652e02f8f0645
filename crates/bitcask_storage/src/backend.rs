//! Storage backend trait definition.

use crate::error::StorageResult;

/// A single segment file, as seen by everything above this crate.
///
/// A backend is an **opaque byte store**: it has no notion of records, CRCs,
/// or the key-sequence prefix `bitcask_core` writes into every key. It just
/// remembers what has been appended, in order, at a stable offset. That
/// offset is exactly what ends up in a keydir `Position` and a hint file
/// entry, so `append`'s return value is load-bearing: get it wrong and every
/// future `get` for that key reads garbage.
///
/// One backend instance always corresponds to exactly one segment file — the
/// active segment gets one, and the segment manager opens one more per
/// immutable segment it has open for reads. Nothing above this trait ever
/// asks a backend to represent more than one segment.
///
/// # Invariants
///
/// - `append` returns the offset where `data` was written, contiguous with
///   whatever was appended before it
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `flush` makes the append visible to a subsequent `read_at` in this
///   process, but gives no durability guarantee across a crash
/// - `sync` does give that durability guarantee
/// - Backends must be `Send + Sync`: the segment manager shares immutable
///   segments across concurrent readers
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] — ephemeral, used by tests and any database
///   opened without `create_if_missing` durability in mind
/// - [`super::FileBackend`] — the one real backend a live database uses,
///   one open file handle per segment
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// Called with the `(offset, size)` half of a keydir `Position` (or a
    /// hint-file entry) to fetch a candidate record's raw bytes for
    /// decoding, and by the segment manager during recovery to probe for a
    /// record header at the current replay offset.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The offset is beyond the current size
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends an already-encoded record's bytes to the end of the segment.
    ///
    /// Returns the offset the record now lives at — the value that becomes
    /// a keydir `Position`'s `offset` once the caller has also durably
    /// recorded the commit marker for the batch this record belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes pending writes to the OS, without forcing them to disk.
    ///
    /// After this returns successfully, a `read_at` in this process sees the
    /// appended bytes, but a crash before the next `sync` can still lose
    /// them. `bitcask_core` never relies on `flush` alone for durability of
    /// a committed batch — see `sync`.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the segment in bytes.
    ///
    /// This is the offset where the next `append` will write, and what a
    /// freshly reopened active segment resumes writing at.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Forces every append made so far to survive a crash.
    ///
    /// A committed batch is not considered durable until this returns
    /// successfully for the segment its commit marker landed in — see
    /// `sync_on_put` and the manual `Database::sync`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the segment to `new_size`, discarding everything after it.
    ///
    /// Used exactly once per segment, by recovery, to drop a
    /// partially-written trailing record left behind by a writer that
    /// crashed mid-append — never by ordinary reads, writes, or merge.
    ///
    /// # Arguments
    ///
    /// * `new_size` - The new size of the segment (offset to truncate to)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
