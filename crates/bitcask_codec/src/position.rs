//! Encoding for `Position`, the value stored in hint-file entries.

use crate::error::CodecResult;
use crate::varint::{read_varint_i64, write_varint_i64};

/// Locates a record within the segmented log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Id of the segment holding the record.
    pub file_id: u32,
    /// Byte offset of the record's header within the segment.
    pub offset: u64,
    /// Total encoded size of the record (header + key + value).
    pub size: u32,
}

impl Position {
    /// Builds a new position.
    #[must_use]
    pub fn new(file_id: u32, offset: u64, size: u32) -> Self {
        Self {
            file_id,
            offset,
            size,
        }
    }

    /// Encodes this position as `fileId | offset | size`, each a zigzag varint.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24);
        write_varint_i64(i64::from(self.file_id), &mut buf);
        write_varint_i64(self.offset as i64, &mut buf);
        write_varint_i64(i64::from(self.size), &mut buf);
        buf
    }

    /// Decodes a position previously produced by [`Position::encode`].
    pub fn decode(buf: &[u8]) -> CodecResult<Self> {
        let (file_id, n1) = read_varint_i64(buf)?;
        let (offset, n2) = read_varint_i64(&buf[n1..])?;
        let (size, _n3) = read_varint_i64(&buf[n1 + n2..])?;
        Ok(Self {
            file_id: file_id as u32,
            offset: offset as u64,
            size: size as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let pos = Position::new(7, 123_456, 256);
        let encoded = pos.encode();
        let decoded = Position::decode(&encoded).unwrap();
        assert_eq!(pos, decoded);
    }

    #[test]
    fn zero_position_roundtrips() {
        let pos = Position::new(0, 0, 0);
        let decoded = Position::decode(&pos.encode()).unwrap();
        assert_eq!(pos, decoded);
    }
}
