//! Transaction-sequence key prefixing used by the batch engine and read back
//! by recovery and merge.
//!
//! Every record actually written to a segment carries its key as
//! `uvarint(txSeq) || userKey`. A bare put/delete outside an explicit batch
//! is committed as a single-record batch, so this prefix is always present.

use crate::error::{CoreError, CoreResult};
use crate::types::TxSeq;
use bitcask_codec::{read_uvarint_u64, write_uvarint_u64};

/// Reserved key that marks a batch as fully committed. No user key may equal
/// this value.
pub const COMMIT_SENTINEL: &[u8] = b"bitcask-tx-finish";

/// Rejects empty and reserved keys.
pub fn validate_key(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::EmptyKey);
    }
    if key == COMMIT_SENTINEL {
        return Err(CoreError::ReservedKey);
    }
    Ok(())
}

/// Prepends `seq` as an unsigned varint to `key`.
pub fn prefix_key(seq: TxSeq, key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10 + key.len());
    write_uvarint_u64(seq.as_u64(), &mut buf);
    buf.extend_from_slice(key);
    buf
}

/// Splits a prefixed on-disk key back into its sequence number and user key.
pub fn parse_prefixed_key(raw: &[u8]) -> CoreResult<(TxSeq, &[u8])> {
    let (seq, n) = read_uvarint_u64(raw)?;
    Ok((TxSeq::new(seq), &raw[n..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_roundtrip() {
        let prefixed = prefix_key(TxSeq::new(42), b"hello");
        let (seq, key) = parse_prefixed_key(&prefixed).unwrap();
        assert_eq!(seq.as_u64(), 42);
        assert_eq!(key, b"hello");
    }

    #[test]
    fn sentinel_is_rejected() {
        assert!(matches!(
            validate_key(COMMIT_SENTINEL),
            Err(CoreError::ReservedKey)
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(validate_key(b""), Err(CoreError::EmptyKey)));
    }
}
