//! The in-memory keydir: a concurrency-safe, ordered map from on-disk key to
//! its current [`Position`](bitcask_codec::Position). Two interchangeable
//! implementations are provided; neither ever touches disk.

mod btree;
mod skiplist;

pub use btree::BTreeKeydir;
pub use skiplist::SkipListKeydir;

use bitcask_codec::Position;

/// A restartable, snapshot-stable ordered cursor over keydir entries.
///
/// The snapshot is taken when the iterator is created; concurrent writes to
/// the keydir after that point are not reflected.
pub type KeydirIter = std::vec::IntoIter<(Vec<u8>, Position)>;

/// Concurrency-safe ordered map from key to position.
///
/// Implementations must allow concurrent reads and serialize writes
/// internally; callers never need external synchronization.
pub trait Keydir: Send + Sync {
    /// Inserts or replaces the position for `key`.
    fn put(&self, key: &[u8], pos: Position);

    /// Looks up the current position for `key`.
    fn get(&self, key: &[u8]) -> Option<Position>;

    /// Removes `key`, returning whether it was present.
    fn delete(&self, key: &[u8]) -> bool;

    /// Number of live keys.
    fn len(&self) -> usize;

    /// Whether the keydir holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an ascending, snapshot-stable iterator over all entries.
    fn iter(&self) -> KeydirIter;
}

/// Builds the keydir implementation selected by [`crate::config::KeydirKind`].
#[must_use]
pub fn build(kind: crate::config::KeydirKind) -> Box<dyn Keydir> {
    match kind {
        crate::config::KeydirKind::BTree { degree } => Box::new(BTreeKeydir::new(degree)),
        crate::config::KeydirKind::SkipList => Box::new(SkipListKeydir::new()),
    }
}
