//! # bitcask_codec
//!
//! Bit-exact wire format for the append-only log: record headers, record
//! bodies and the CRC that guards them, plus the small positional codec used
//! by hint files.
//!
//! ## Record layout
//!
//! ```text
//! crc(4, big-endian) | tombstone(1) | keySize(zigzag varint) | valueSize(zigzag varint) | key | value
//! ```
//!
//! The CRC covers every byte after itself. A header that decodes to all
//! zeroes is treated as end-of-segment padding rather than a corrupt record.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crc;
mod error;
mod position;
mod record;
mod varint;

pub use crc::checksum;
pub use error::{CodecError, CodecResult};
pub use position::Position;
pub use record::{Record, RecordHeader, MAX_HEADER_SIZE, MIN_HEADER_PREFIX};
pub use varint::{read_uvarint_u64, read_varint_i64, write_uvarint_u64, write_varint_i64};
