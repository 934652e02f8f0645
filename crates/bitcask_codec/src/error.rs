//! Codec error types.

use thiserror::Error;

/// Errors produced while encoding or decoding records and index entries.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    /// Fewer bytes were available than a header requires.
    #[error("header truncated: need at least {needed} bytes, have {available}")]
    ShortHeader {
        /// Minimum bytes a header decode needs to make progress.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The record body (key + value) was shorter than the header promised.
    #[error("record body truncated: need {needed} bytes, have {available}")]
    ShortBody {
        /// Bytes the header says the body occupies.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The stored checksum did not match the recomputed one.
    #[error("checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    BadCrc {
        /// Checksum stored in the record header.
        expected: u32,
        /// Checksum recomputed from the record bytes.
        actual: u32,
    },

    /// A varint ran past the end of the supplied buffer without terminating.
    #[error("truncated varint")]
    TruncatedVarint,

    /// A varint decoded to a value wider than the target integer type.
    #[error("varint overflow")]
    VarintOverflow,

    /// A decoded size field was negative or otherwise out of range.
    #[error("invalid size field: {0}")]
    InvalidSize(i64),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
