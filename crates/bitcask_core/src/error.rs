//! Error types for the database core.

use crate::types::FileId;
use bitcask_codec::CodecError;
use bitcask_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A put or batch put was attempted with an empty key.
    #[error("key must not be empty")]
    EmptyKey,

    /// A put or batch put used the reserved commit-marker key.
    #[error("key is reserved for internal use")]
    ReservedKey,

    /// A value exceeded the configured maximum segment size on its own.
    #[error("value of {size} bytes exceeds the maximum segment size of {max} bytes")]
    ValueTooLarge {
        /// Size of the rejected value.
        size: u64,
        /// Configured maximum segment size.
        max: u64,
    },

    /// The requested key has no live record.
    #[error("key not found")]
    NoRecord,

    /// A record's checksum did not match its contents.
    #[error("checksum mismatch reading segment {file_id}: {source}")]
    BadCrc {
        /// Segment the corrupt record was read from.
        file_id: FileId,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// A segment file's contents could not be parsed.
    #[error("corrupt data file {file_id} at offset {offset}")]
    CorruptDataFile {
        /// Segment id.
        file_id: FileId,
        /// Byte offset of the offending record.
        offset: u64,
    },

    /// The keydir references a segment that is not open.
    #[error("no open data file for segment {0}")]
    NoDataFile(FileId),

    /// No storage backend factory was configured.
    #[error("no I/O manager configured")]
    NoIOManager,

    /// The database directory is already locked by another process.
    #[error("database directory already in use: {0}")]
    DirInUse(PathBuf),

    /// The directory lock could not be acquired or released.
    #[error("failed to acquire the database file lock at {0}")]
    NeedFileLock(PathBuf),

    /// Updating the in-memory keydir failed after a durable append.
    #[error("failed to update keydir for key")]
    UpdateKeydir,

    /// A write batch exceeded the configured maximum record count.
    #[error("write batch exceeds the maximum of {max} records")]
    BatchTooLarge {
        /// Configured maximum batch size.
        max: usize,
    },

    /// A merge was requested while one was already running.
    #[error("a merge is already in progress")]
    MergeInProgress,

    /// The merge-finished marker file could not be parsed.
    #[error("invalid merge-finished marker file")]
    InvalidMergeFinishedFile,

    /// The database directory does not exist and `create_if_missing` is false.
    #[error("database directory does not exist: {0}")]
    DirNotFound(PathBuf),

    /// A lower-level storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A lower-level codec error not already attributed to a specific segment.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Builds a [`CoreError::BadCrc`].
    #[must_use]
    pub fn bad_crc(file_id: FileId, source: CodecError) -> Self {
        Self::BadCrc { file_id, source }
    }

    /// Builds a [`CoreError::CorruptDataFile`].
    #[must_use]
    pub fn corrupt_data_file(file_id: FileId, offset: u64) -> Self {
        Self::CorruptDataFile { file_id, offset }
    }

    /// Builds a [`CoreError::ValueTooLarge`].
    #[must_use]
    pub fn value_too_large(size: u64, max: u64) -> Self {
        Self::ValueTooLarge { size, max }
    }

    /// Builds a [`CoreError::BatchTooLarge`].
    #[must_use]
    pub fn batch_too_large(max: usize) -> Self {
        Self::BatchTooLarge { max }
    }
}
