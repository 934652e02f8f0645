//! On-disk record format.
//!
//! ```text
//! crc(4, big-endian) | tombstone(1) | keySize(zigzag varint) | valueSize(zigzag varint) | key | value
//! ```
//!
//! The CRC covers every byte from `tombstone` through the end of `value`.
//! A header that decodes to an all-zero CRC, non-tombstone, zero key size
//! and zero value size is treated as padding / end-of-file rather than an
//! error, since segments may be zero-extended by a crashed writer.

use crate::crc;
use crate::error::{CodecError, CodecResult};
use crate::varint::{read_varint_i64, write_varint_i64};

/// Upper bound on header size: 4 (crc) + 1 (tombstone) + 5 + 5 (varint key/value sizes).
pub const MAX_HEADER_SIZE: usize = 15;

/// The minimum number of bytes needed to even begin decoding a header.
pub const MIN_HEADER_PREFIX: usize = 5;

/// A decoded record header, without the key/value payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Checksum stored in the header.
    pub crc: u32,
    /// Whether this record is a tombstone (delete marker).
    pub tombstone: bool,
    /// Encoded key length in bytes.
    pub key_size: usize,
    /// Encoded value length in bytes (always 0 for tombstones).
    pub value_size: usize,
}

impl RecordHeader {
    /// Returns true if this header is the all-zero end-of-segment sentinel.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.crc == 0 && !self.tombstone && self.key_size == 0 && self.value_size == 0
    }
}

/// A logical key/value record (or tombstone) as stored in a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Raw on-disk key bytes (may carry a transaction-sequence prefix).
    pub key: Vec<u8>,
    /// Value bytes; empty for tombstones.
    pub value: Vec<u8>,
    /// Whether this record deletes `key`.
    pub tombstone: bool,
}

impl Record {
    /// Builds a put record.
    #[must_use]
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            tombstone: false,
        }
    }

    /// Builds a tombstone record for `key`.
    #[must_use]
    pub fn delete(key: Vec<u8>) -> Self {
        Self {
            key,
            value: Vec::new(),
            tombstone: true,
        }
    }

    /// Encodes this record to its on-disk byte representation.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + 10 + 10 + self.key.len() + self.value.len());
        body.push(u8::from(self.tombstone));
        write_varint_i64(self.key.len() as i64, &mut body);
        write_varint_i64(self.value.len() as i64, &mut body);
        body.extend_from_slice(&self.key);
        body.extend_from_slice(&self.value);

        let crc = crc::checksum(&body);
        let mut out = Vec::with_capacity(4 + body.len());
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Total encoded size of this record in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        4 + 1 + varint_len(self.key.len() as i64) + varint_len(self.value.len() as i64)
            + self.key.len()
            + self.value.len()
    }

    /// Decodes a single record from the start of `buf`.
    ///
    /// Returns the record and the number of bytes consumed. `Ok(None)` means
    /// `buf` begins with the zero-padding end-of-segment sentinel.
    pub fn decode(buf: &[u8]) -> CodecResult<Option<(Self, usize)>> {
        if buf.len() < MIN_HEADER_PREFIX {
            return Err(CodecError::ShortHeader {
                needed: MIN_HEADER_PREFIX,
                available: buf.len(),
            });
        }
        let crc = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let tombstone = buf[4] != 0;
        let (key_size, n1) = read_varint_i64(&buf[5..])?;
        let (value_size, n2) = read_varint_i64(&buf[5 + n1..])?;

        let header = RecordHeader {
            crc,
            tombstone,
            key_size: non_negative(key_size)?,
            value_size: non_negative(value_size)?,
        };
        if header.is_zero() {
            return Ok(None);
        }

        let header_len = 5 + n1 + n2;
        let body_len = header.key_size + header.value_size;
        if buf.len() < header_len + body_len {
            return Err(CodecError::ShortBody {
                needed: header_len + body_len,
                available: buf.len(),
            });
        }

        let computed = crc::checksum(&buf[4..header_len + body_len]);
        if computed != crc {
            return Err(CodecError::BadCrc {
                expected: crc,
                actual: computed,
            });
        }

        let key = buf[header_len..header_len + header.key_size].to_vec();
        let value = buf[header_len + header.key_size..header_len + body_len].to_vec();
        Ok(Some((
            Self {
                key,
                value,
                tombstone,
            },
            header_len + body_len,
        )))
    }
}

fn non_negative(v: i64) -> CodecResult<usize> {
    usize::try_from(v).map_err(|_| CodecError::InvalidSize(v))
}

fn varint_len(v: i64) -> usize {
    let zigzag = ((v << 1) ^ (v >> 63)) as u64;
    let mut n = 1;
    let mut rest = zigzag >> 7;
    while rest != 0 {
        n += 1;
        rest >>= 7;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn put_record_roundtrip() {
        let record = Record::put(b"hello".to_vec(), b"world".to_vec());
        let encoded = record.encode();
        assert_eq!(encoded.len(), record.encoded_len());
        let (decoded, n) = Record::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, record);
        assert_eq!(n, encoded.len());
    }

    #[test]
    fn tombstone_roundtrip() {
        let record = Record::delete(b"gone".to_vec());
        let encoded = record.encode();
        let (decoded, _) = Record::decode(&encoded).unwrap().unwrap();
        assert!(decoded.tombstone);
        assert!(decoded.value.is_empty());
    }

    #[test]
    fn empty_value_roundtrip() {
        let record = Record::put(b"k".to_vec(), Vec::new());
        let encoded = record.encode();
        let (decoded, _) = Record::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn zero_padding_decodes_as_eof() {
        let buf = vec![0u8; 32];
        assert_eq!(Record::decode(&buf).unwrap(), None);
    }

    #[test]
    fn corrupted_byte_is_detected() {
        let record = Record::put(b"key".to_vec(), b"value".to_vec());
        let mut encoded = record.encode();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        let err = Record::decode(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::BadCrc { .. }));
    }

    #[test]
    fn truncated_body_is_detected() {
        let record = Record::put(b"key".to_vec(), b"value".to_vec());
        let encoded = record.encode();
        let truncated = &encoded[..encoded.len() - 2];
        let err = Record::decode(truncated).unwrap_err();
        assert!(matches!(err, CodecError::ShortBody { .. }));
    }

    #[test]
    fn short_prefix_is_detected() {
        let err = Record::decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CodecError::ShortHeader { .. }));
    }

    proptest! {
        #[test]
        fn arbitrary_put_roundtrips(key in prop::collection::vec(any::<u8>(), 1..64),
                                     value in prop::collection::vec(any::<u8>(), 0..256)) {
            let record = Record::put(key, value);
            let encoded = record.encode();
            let (decoded, n) = Record::decode(&encoded).unwrap().unwrap();
            prop_assert_eq!(decoded, record);
            prop_assert_eq!(n, encoded.len());
        }
    }
}
