//! Skip-list keydir: a real probabilistic skip list (not a stub), guarded by
//! a single lock for writes and readable concurrently with readers.

use crate::keydir::{Keydir, KeydirIter};
use bitcask_codec::Position;
use parking_lot::RwLock;

const MAX_LEVEL: usize = 16;
const NIL: usize = usize::MAX;

struct Node {
    key: Vec<u8>,
    value: Position,
    forward: [usize; MAX_LEVEL],
}

struct Inner {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head_forward: [usize; MAX_LEVEL],
    rng: u64,
    len: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head_forward: [NIL; MAX_LEVEL],
            rng: 0x9E37_79B9_7F4A_7C15,
            len: 0,
        }
    }

    fn node_key(&self, idx: usize) -> &[u8] {
        self.nodes[idx].as_ref().expect("live index").key.as_slice()
    }

    fn forward_of(&self, pred: Option<usize>, lvl: usize) -> usize {
        match pred {
            None => self.head_forward[lvl],
            Some(idx) => self.nodes[idx].as_ref().expect("live index").forward[lvl],
        }
    }

    fn set_forward(&mut self, pred: Option<usize>, lvl: usize, target: usize) {
        match pred {
            None => self.head_forward[lvl] = target,
            Some(idx) => self.nodes[idx].as_mut().expect("live index").forward[lvl] = target,
        }
    }

    /// xorshift64* — deterministic and dependency-free, good enough for
    /// choosing node heights.
    fn next_rng(&mut self) -> u64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }

    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level < MAX_LEVEL - 1 && self.next_rng() & 1 == 0 {
            level += 1;
        }
        level
    }

    /// Finds, at each level, the last node whose key is strictly less than
    /// `key`. `None` means the head (no predecessor).
    fn find_update(&self, key: &[u8]) -> [Option<usize>; MAX_LEVEL] {
        let mut update = [None; MAX_LEVEL];
        let mut cur: Option<usize> = None;
        for lvl in (0..MAX_LEVEL).rev() {
            loop {
                let nxt = self.forward_of(cur, lvl);
                if nxt != NIL && self.node_key(nxt) < key {
                    cur = Some(nxt);
                } else {
                    break;
                }
            }
            update[lvl] = cur;
        }
        update
    }

    fn get(&self, key: &[u8]) -> Option<Position> {
        let update = self.find_update(key);
        let candidate = self.forward_of(update[0], 0);
        if candidate != NIL && self.node_key(candidate) == key {
            Some(self.nodes[candidate].as_ref().expect("live index").value)
        } else {
            None
        }
    }

    fn put(&mut self, key: &[u8], value: Position) {
        let update = self.find_update(key);
        let candidate = self.forward_of(update[0], 0);
        if candidate != NIL && self.node_key(candidate) == key {
            self.nodes[candidate].as_mut().expect("live index").value = value;
            return;
        }

        let new_level = self.random_level();
        let node = Node {
            key: key.to_vec(),
            value,
            forward: [NIL; MAX_LEVEL],
        };
        let idx = if let Some(free) = self.free.pop() {
            self.nodes[free] = Some(node);
            free
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        };

        for (lvl, pred) in update.into_iter().enumerate().take(new_level + 1) {
            let succ = self.forward_of(pred, lvl);
            self.set_forward(pred, lvl, idx);
            self.nodes[idx].as_mut().expect("live index").forward[lvl] = succ;
        }
        self.len += 1;
    }

    fn delete(&mut self, key: &[u8]) -> bool {
        let update = self.find_update(key);
        let candidate = self.forward_of(update[0], 0);
        if candidate == NIL || self.node_key(candidate) != key {
            return false;
        }
        let forward = self.nodes[candidate].as_ref().expect("live index").forward;
        for (lvl, pred) in update.into_iter().enumerate() {
            if self.forward_of(pred, lvl) == candidate {
                self.set_forward(pred, lvl, forward[lvl]);
            }
        }
        self.nodes[candidate] = None;
        self.free.push(candidate);
        self.len -= 1;
        true
    }

    fn iter_sorted(&self) -> Vec<(Vec<u8>, Position)> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head_forward[0];
        while cur != NIL {
            let node = self.nodes[cur].as_ref().expect("live index");
            out.push((node.key.clone(), node.value));
            cur = node.forward[0];
        }
        out
    }
}

/// Skip-list-backed keydir.
pub struct SkipListKeydir {
    inner: RwLock<Inner>,
}

impl SkipListKeydir {
    /// Creates an empty keydir.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }
}

impl Default for SkipListKeydir {
    fn default() -> Self {
        Self::new()
    }
}

impl Keydir for SkipListKeydir {
    fn put(&self, key: &[u8], pos: Position) {
        self.inner.write().put(key, pos);
    }

    fn get(&self, key: &[u8]) -> Option<Position> {
        self.inner.read().get(key)
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.inner.write().delete(key)
    }

    fn len(&self) -> usize {
        self.inner.read().len
    }

    fn iter(&self) -> KeydirIter {
        self.inner.read().iter_sorted().into_iter()
    }
}
