//! # bitcask_storage
//!
//! The segment file abstraction underneath every bitcask segment:
//! `bitcask_core`'s `SegmentManager` opens one [`StorageBackend`] per
//! segment id and otherwise forgets this crate exists.
//!
//! Backends are **opaque byte stores**: a segment's record headers, CRCs,
//! and the transaction-sequence prefix on every key are entirely
//! `bitcask_core`'s concern. This crate only has to remember what has been
//! appended and at what offset, and hand those bytes back unchanged.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, flush)
//! - No knowledge of record formats, segments, or keydirs
//! - Must be `Send + Sync` for concurrent access
//! - `bitcask_core` owns all file-format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - no on-disk footprint, for exercising the core
//!   without a filesystem
//! - [`FileBackend`] - the one real backend, one open file handle per
//!   segment on disk
//!
//! ## Example
//!
//! ```rust
//! use bitcask_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut segment = InMemoryBackend::new();
//! let offset = segment.append(b"an encoded bitcask record").unwrap();
//! let data = segment.read_at(offset, 25).unwrap();
//! assert_eq!(&data, b"an encoded bitcask record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod lock;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use lock::DirLock;
pub use memory::InMemoryBackend;
