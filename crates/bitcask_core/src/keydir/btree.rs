//! Ordered-tree keydir backed by `std::collections::BTreeMap`.

use crate::keydir::{Keydir, KeydirIter};
use bitcask_codec::Position;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Ordered-tree keydir.
///
/// `degree` is accepted for API parity with the configurable-fan-out
/// requirement but is otherwise informational: the standard library's
/// `BTreeMap` does not expose a tunable node size.
pub struct BTreeKeydir {
    degree: usize,
    map: RwLock<BTreeMap<Vec<u8>, Position>>,
}

impl BTreeKeydir {
    /// Creates an empty keydir with the given target fan-out.
    #[must_use]
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            map: RwLock::new(BTreeMap::new()),
        }
    }

    /// The configured fan-out.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl Keydir for BTreeKeydir {
    fn put(&self, key: &[u8], pos: Position) {
        self.map.write().insert(key.to_vec(), pos);
    }

    fn get(&self, key: &[u8]) -> Option<Position> {
        self.map.read().get(key).copied()
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.map.write().remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.map.read().len()
    }

    fn iter(&self) -> KeydirIter {
        let snapshot: Vec<_> = self
            .map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        snapshot.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(n: u32) -> Position {
        Position::new(0, u64::from(n), 1)
    }

    #[test]
    fn put_get_delete() {
        let kd = BTreeKeydir::new(32);
        kd.put(b"a", pos(1));
        assert_eq!(kd.get(b"a"), Some(pos(1)));
        assert!(kd.delete(b"a"));
        assert_eq!(kd.get(b"a"), None);
        assert!(!kd.delete(b"a"));
    }

    #[test]
    fn iterator_is_ascending() {
        let kd = BTreeKeydir::new(32);
        kd.put(b"b", pos(2));
        kd.put(b"a", pos(1));
        kd.put(b"c", pos(3));
        let keys: Vec<_> = kd.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn iterator_snapshot_is_stable_against_later_writes() {
        let kd = BTreeKeydir::new(32);
        kd.put(b"a", pos(1));
        let mut it = kd.iter();
        kd.put(b"b", pos(2));
        assert_eq!(it.next(), Some((b"a".to_vec(), pos(1))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn overwrite_replaces_position() {
        let kd = BTreeKeydir::new(32);
        kd.put(b"a", pos(1));
        kd.put(b"a", pos(2));
        assert_eq!(kd.get(b"a"), Some(pos(2)));
        assert_eq!(kd.len(), 1);
    }
}
