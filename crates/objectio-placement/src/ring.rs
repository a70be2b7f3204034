//! Consistent hash ring with virtual nodes
//!
//! Maintains a sorted array of `(hash, node_name)` virtual-node entries.
//! Each physical node contributes `vnodes_per_node` entries, spreading
//! its share of the keyspace across the ring so that adding or removing
//! one physical node only remaps roughly `1/(n+1)` of all keys instead of
//! reshuffling everything, the way naive `hash(key) % n` placement would.

use crate::error::{PlacementError, Result};
use std::collections::BTreeMap;
use xxhash_rust::xxh64::xxh64;

/// A consistent hash ring over physical node names.
///
/// Lookups are deterministic and O(log n) via binary search on the
/// sorted vnode array (backed here by a `BTreeMap` for simplicity of
/// insertion/removal; the map's `range` method gives us the ordered
/// walk `successors` needs).
#[derive(Clone, Debug, Default)]
pub struct HashRing {
    vnodes_per_node: u32,
    /// hash -> physical node name
    ring: BTreeMap<u64, String>,
    physical: std::collections::HashSet<String>,
}

impl HashRing {
    #[must_use]
    pub fn new(vnodes_per_node: u32) -> Self {
        Self {
            vnodes_per_node,
            ring: BTreeMap::new(),
            physical: std::collections::HashSet::new(),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.physical.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.physical.is_empty()
    }

    /// Add a physical node, inserting its vnodes into the ring. A no-op
    /// if the node is already present.
    pub fn add_node(&mut self, name: &str) {
        if self.physical.contains(name) {
            return;
        }
        for i in 0..self.vnodes_per_node {
            let h = vnode_hash(name, i);
            self.ring.insert(h, name.to_string());
        }
        self.physical.insert(name.to_string());
    }

    /// Remove a physical node and all of its vnodes.
    pub fn remove_node(&mut self, name: &str) {
        if !self.physical.remove(name) {
            return;
        }
        for i in 0..self.vnodes_per_node {
            let h = vnode_hash(name, i);
            self.ring.remove(&h);
        }
    }

    /// Look up the physical node owning `key`: the first vnode whose
    /// hash is >= `hash(key)`, wrapping around to the smallest hash if
    /// `hash(key)` is past the last vnode.
    pub fn lookup(&self, key: &str) -> Result<&str> {
        if self.ring.is_empty() {
            return Err(PlacementError::EmptyRing);
        }
        let h = key_hash(key);
        let node = self
            .ring
            .range(h..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, name)| name.as_str())
            .expect("ring is non-empty");
        Ok(node)
    }

    /// Walk the ring clockwise from `key`'s position, returning up to
    /// `n` distinct physical nodes in succession order.
    pub fn successors(&self, key: &str, n: usize) -> Result<Vec<String>> {
        if self.ring.is_empty() {
            return Err(PlacementError::EmptyRing);
        }
        let h = key_hash(key);
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(n.min(self.physical.len()));

        let after = self.ring.range(h..).map(|(_, v)| v);
        let wrapped = self.ring.range(..h).map(|(_, v)| v);
        for name in after.chain(wrapped) {
            if out.len() == n || seen.len() == self.physical.len() {
                break;
            }
            if seen.insert(name.clone()) {
                out.push(name.clone());
            }
        }
        Ok(out)
    }
}

fn vnode_hash(name: &str, index: u32) -> u64 {
    let mut buf = Vec::with_capacity(name.len() + 4);
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&index.to_le_bytes());
    xxh64(&buf, 0)
}

fn key_hash(key: &str) -> u64 {
    xxh64(key.as_bytes(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_deterministic() {
        let mut ring = HashRing::new(150);
        ring.add_node("node-a");
        ring.add_node("node-b");
        ring.add_node("node-c");

        let key = "album/2024/summer.raw";
        let first = ring.lookup(key).unwrap().to_string();
        for _ in 0..10_000 {
            assert_eq!(ring.lookup(key).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_ring_errors() {
        let ring = HashRing::new(150);
        assert!(matches!(ring.lookup("x"), Err(PlacementError::EmptyRing)));
    }

    #[test]
    fn test_add_node_remap_bound() {
        let mut ring = HashRing::new(150);
        ring.add_node("node-a");
        ring.add_node("node-b");
        ring.add_node("node-c");

        let keys: Vec<String> = (0..10_000).map(|i| format!("key-{i}")).collect();
        let before: Vec<String> = keys.iter().map(|k| ring.lookup(k).unwrap().to_string()).collect();

        ring.add_node("node-d");
        let remapped = keys
            .iter()
            .zip(before.iter())
            .filter(|(k, old)| ring.lookup(k).unwrap() != old.as_str())
            .count();

        // Expect roughly 1/4 of keys to remap; allow a generous band.
        assert!(remapped >= 1_666 && remapped <= 3_333, "remapped={remapped}");
    }

    #[test]
    fn test_successors_distinct() {
        let mut ring = HashRing::new(150);
        ring.add_node("a");
        ring.add_node("b");
        ring.add_node("c");

        let succ = ring.successors("some/key", 3).unwrap();
        assert_eq!(succ.len(), 3);
        let unique: std::collections::HashSet<_> = succ.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_successors_fewer_than_requested() {
        let mut ring = HashRing::new(150);
        ring.add_node("only-one");
        let succ = ring.successors("k", 5).unwrap();
        assert_eq!(succ, vec!["only-one".to_string()]);
    }
}
