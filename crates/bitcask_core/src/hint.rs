//! Hint file encoding: a compact index snapshot written by the merge engine
//! so the next open can skip replaying every merged segment byte by byte.
//!
//! Each entry is an ordinary [`Record`] whose key is the live user key and
//! whose value is an encoded [`Position`]. The file is read and written in
//! one shot since a hint file only ever covers the already-merged, and
//! therefore comparatively small, portion of the keyspace.

use crate::error::CoreResult;
use bitcask_codec::{Position, Record};
use std::fs;
use std::path::Path;

/// Writes `entries` to `path` as a sequence of encoded records.
pub fn write_hint_file(path: &Path, entries: &[(Vec<u8>, Position)]) -> CoreResult<()> {
    let mut buf = Vec::new();
    for (key, pos) in entries {
        let record = Record::put(key.clone(), pos.encode());
        buf.extend_from_slice(&record.encode());
    }
    fs::write(path, buf)?;
    Ok(())
}

/// Reads every entry out of a hint file. Returns an empty vector if the file
/// does not exist.
pub fn read_hint_file(path: &Path) -> CoreResult<Vec<(Vec<u8>, Position)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let buf = fs::read(path)?;
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        match Record::decode(&buf[offset..])? {
            None => break,
            Some((record, consumed)) => {
                let pos = Position::decode(&record.value)?;
                out.push((record.key, pos));
                offset += consumed;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_empty() {
        let temp = tempdir().unwrap();
        let entries = read_hint_file(&temp.path().join("none")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn write_then_read_roundtrips() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cqkv.hint");
        let entries = vec![
            (b"a".to_vec(), Position::new(0, 0, 10)),
            (b"b".to_vec(), Position::new(0, 10, 20)),
        ];
        write_hint_file(&path, &entries).unwrap();
        let read_back = read_hint_file(&path).unwrap();
        assert_eq!(read_back, entries);
    }
}
