//! Consistent-Hash Node Ring
//!
//! Clients that spread keys across several embercache nodes need a stable
//! key-to-node assignment that survives membership changes. A consistent
//! hash ring gives them that: each node is hashed onto the ring at many
//! virtual points, and a key belongs to the first node point at or after
//! the key's own hash, wrapping around at the top.
//!
//! Adding or removing one node only remaps the keys that fell on that
//! node's points; everything else keeps its assignment. With a replication
//! factor above one, [`HashRing::nodes_for`] walks clockwise past the
//! primary to collect distinct fallback nodes.

use std::collections::{BTreeMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Default number of virtual points per node.
///
/// More points smooth the key distribution at the cost of a larger ring.
pub const DEFAULT_VIRTUAL_NODES: usize = 100;

/// A consistent-hash ring over named cache nodes.
///
/// # Example
///
/// ```
/// use embercache::cluster::HashRing;
///
/// let mut ring = HashRing::new(100);
/// ring.add_node("10.0.0.1:11211");
/// ring.add_node("10.0.0.2:11211");
///
/// let primary = ring.node_for(b"session:42").unwrap();
/// assert!(primary.ends_with(":11211"));
///
/// // Two distinct nodes for a replication factor of 2.
/// let replicas = ring.nodes_for(b"session:42", 2);
/// assert_eq!(replicas.len(), 2);
/// assert_ne!(replicas[0], replicas[1]);
/// ```
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Virtual points per node
    virtual_nodes: usize,
    /// Hash point -> node name
    ring: BTreeMap<u64, String>,
    /// Known node names
    nodes: HashSet<String>,
}

impl HashRing {
    /// Creates an empty ring with the given number of virtual points per node.
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            ring: BTreeMap::new(),
            nodes: HashSet::new(),
        }
    }

    /// Adds a node to the ring. Adding a node twice is a no-op.
    pub fn add_node(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.nodes.insert(name.clone()) {
            return;
        }
        for i in 0..self.virtual_nodes {
            let point = hash_point(&name, i);
            self.ring.insert(point, name.clone());
        }
    }

    /// Removes a node and all of its virtual points.
    pub fn remove_node(&mut self, name: &str) {
        if !self.nodes.remove(name) {
            return;
        }
        self.ring.retain(|_, node| node != name);
    }

    /// Returns the primary node for `key`, or `None` on an empty ring.
    pub fn node_for(&self, key: &[u8]) -> Option<&str> {
        let h = hash_key(key);
        self.ring
            .range(h..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, node)| node.as_str())
    }

    /// Returns up to `count` distinct nodes for `key`, primary first.
    ///
    /// Walks the ring clockwise from the key's hash and collects each node
    /// the first time one of its points is passed.
    pub fn nodes_for(&self, key: &[u8], count: usize) -> Vec<&str> {
        let mut found: Vec<&str> = Vec::new();
        if count == 0 || self.nodes.is_empty() {
            return found;
        }

        let h = hash_key(key);
        let clockwise = self.ring.range(h..).chain(self.ring.range(..h));
        for (_, node) in clockwise {
            if !found.contains(&node.as_str()) {
                found.push(node);
                if found.len() == count || found.len() == self.nodes.len() {
                    break;
                }
            }
        }
        found
    }

    /// Returns the number of nodes on the ring.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the ring has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns whether `name` is on the ring.
    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.contains(name)
    }
}

fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn hash_point(node: &str, index: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}
