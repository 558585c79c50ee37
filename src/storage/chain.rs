//! Bucket Chains
//!
//! The key table and every hash entry's field map are fixed-size arrays of
//! buckets. A key is folded into a bucket with a djb2 string hash, and each
//! bucket holds a chain of `(name, value)` nodes that is scanned linearly.
//!
//! ```text
//!   bucket_index("user:1", 256) = djb2("user:1") % 256
//!
//!   buckets[0]   ──> (empty)
//!   buckets[1]   ──> ("b", ..) ──> ("a", ..)
//!   ...
//!   buckets[255] ──> ("user:1", ..)
//! ```
//!
//! New names are prepended, so inserting a fresh key is O(1); lookups and
//! removals are O(chain length). There is no resizing.

use std::collections::VecDeque;

/// djb2: `h = h * 33 + byte`, seeded with 5381.
#[inline]
pub fn djb2(name: &[u8]) -> u64 {
    name.iter().fold(5381u64, |h, &b| {
        h.wrapping_shl(5).wrapping_add(h).wrapping_add(u64::from(b))
    })
}

/// Folds a name into one of `buckets` slots.
#[inline]
pub fn bucket_index(name: &str, buckets: usize) -> usize {
    debug_assert!(buckets > 0);
    (djb2(name.as_bytes()) % buckets as u64) as usize
}

/// A single bucket: a chain of nodes whose names are unique.
#[derive(Debug, Clone)]
pub struct Chain<V> {
    nodes: VecDeque<(String, V)>,
}

impl<V> Default for Chain<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Chain<V> {
    pub fn new() -> Self {
        Self {
            nodes: VecDeque::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.nodes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.nodes
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Prepends a node. The caller guarantees `name` is not already chained.
    pub fn push_front(&mut self, name: String, value: V) -> &mut V {
        debug_assert!(self.position(&name).is_none());
        self.nodes.push_front((name, value));
        &mut self.nodes[0].1
    }

    /// Replaces the value under `name`, or prepends a new node.
    ///
    /// Returns the previous value if the name was already present.
    pub fn upsert(&mut self, name: &str, value: V) -> Option<V> {
        match self.get_mut(name) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.push_front(name.to_string(), value);
                None
            }
        }
    }

    /// Unlinks the node under `name` and hands back its value.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        let idx = self.position(name)?;
        self.nodes.remove(idx).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.nodes.iter().map(|(n, v)| (n.as_str(), v))
    }
}
