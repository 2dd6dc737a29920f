//! # Consistent-Hash Ring
//!
//! Maps keys to owning peer identifiers. Each real peer contributes a
//! configurable number of virtual positions so key ownership stays smooth
//! as the peer set grows. The ring is append-only: callers that need a new
//! peer set build a fresh ring and swap it in, so an installed ring is
//! effectively read-only for its lifetime.

use std::collections::HashMap;

/// Hash function mapping bytes to a 32-bit ring position.
pub type HashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Consistent-hash map from keys to peer identifiers.
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual positions.
    positions: Vec<u32>,
    /// Virtual position -> owning peer. Collisions resolve last-writer-wins,
    /// which is acceptable at 32 bits with modest peer counts.
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Creates a ring with `replicas` virtual nodes per peer and the default
    /// CRC32/IEEE hash.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, Box::new(crc32fast::hash))
    }

    /// Creates a ring with a caller-provided hash function.
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        HashRing {
            hash,
            replicas: replicas.max(1),
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Adds real peers to the ring.
    ///
    /// Each peer contributes `replicas` virtual positions, hashed from the
    /// decimal replica index (no padding) concatenated with the peer id.
    /// The position list is re-sorted once after all insertions.
    pub fn add_nodes<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{i}{node}").as_bytes());
                self.positions.push(position);
                self.owners.insert(position, node.to_string());
            }
        }
        self.positions.sort_unstable();
    }

    /// Returns the peer owning `key`, or `None` on an empty ring.
    ///
    /// Picks the first virtual position at or after the key's hash, wrapping
    /// to the start of the ring when the hash is past the last position.
    pub fn locate(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let target = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&position| position < target);
        let idx = if idx == self.positions.len() { 0 } else { idx };
        self.owners.get(&self.positions[idx]).map(String::as_str)
    }

    /// Returns true when no peers have been added.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
