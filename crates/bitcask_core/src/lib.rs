//! # bitcask_core
//!
//! Core engine for an embeddable, Bitcask-style append-only log key-value
//! store: one active segment accepting writes, zero or more sealed
//! immutable segments, and an in-memory keydir mapping every live key to
//! its position in the log.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Database                     │
//! │   (public facade: open, put, get, delete,     │
//! │    batch, merge)                              │
//! └───────────┬───────────────────┬───────────────┘
//!             │                   │
//! ┌───────────▼───────────┐ ┌─────▼─────────────────┐
//! │     WriteBatch         │ │       Keydir           │
//! │  (atomic multi-key     │ │  (BTree or skip list)  │
//! │   commit, tx sequence) │ │                        │
//! └───────────┬────────────┘ └────────────────────────┘
//!             │
//! ┌───────────▼────────────┐   ┌────────────────────┐
//! │    SegmentManager       │──▶│  recovery / merge   │
//! │ (active + immutable     │   │ (replay, compact)   │
//! │  segments, rollover)    │   └────────────────────┘
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────────────────────────────┐
//! │          StorageBackend (bitcask_storage)        │
//! │        (opaque byte store: File, InMemory)       │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Durability
//!
//! Every put/delete, whether bare or part of an explicit [`WriteBatch`], is
//! written as one sequence-numbered mini-transaction: all affected records
//! followed by a commit-marker record. Recovery only applies a
//! transaction's writes to the keydir once its marker has been seen, so a
//! crash mid-write leaves the keydir exactly as it was before the write
//! started.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod dir;
mod error;
mod hint;
mod keydir;
mod keyenc;
mod merge;
mod recovery;
mod segment;
mod types;

mod database;

pub use batch::WriteBatch;
pub use config::{KeydirKind, Options};
pub use database::{Database, DatabaseStats};
pub use error::{CoreError, CoreResult};
pub use merge::MergeOutcome;
pub use segment::BackendFactory;
pub use types::{FileId, TxSeq};
