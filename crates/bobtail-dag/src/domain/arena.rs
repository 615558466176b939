//! Node storage.
//!
//! All nodes live in one arena addressed by 32-bit handles; ancestor and
//! descendant edges are handle sets. Handles stay valid for the life of
//! the arena — only a rejected node, necessarily the most recently
//! created one, is ever removed.

use std::collections::{BTreeSet, HashMap};

use shared_types::{Hash, SubBlock};

/// Index of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(pub u32);

/// One subblock and its position in the relay graph.
#[derive(Clone, Debug)]
pub struct DagNode {
    pub hash: Hash,
    /// Owning component id; -1 while unassigned.
    pub dag_id: i16,
    pub subblock: SubBlock,
    pub ancestors: BTreeSet<NodeHandle>,
    pub descendants: BTreeSet<NodeHandle>,
}

impl DagNode {
    fn new(subblock: SubBlock) -> Self {
        Self {
            hash: subblock.hash(),
            dag_id: -1,
            subblock,
            ancestors: BTreeSet::new(),
            descendants: BTreeSet::new(),
        }
    }

    /// Nothing below it.
    pub fn is_base(&self) -> bool {
        self.ancestors.is_empty()
    }

    /// Nothing above it.
    pub fn is_tip(&self) -> bool {
        self.descendants.is_empty()
    }

    pub fn is_assigned(&self) -> bool {
        self.dag_id >= 0
    }
}

/// Append-only node storage with a hash index.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<DagNode>,
    by_hash: HashMap<Hash, NodeHandle>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn handle_of(&self, hash: &Hash) -> Option<NodeHandle> {
        self.by_hash.get(hash).copied()
    }

    pub fn node(&self, handle: NodeHandle) -> &DagNode {
        &self.nodes[handle.0 as usize]
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut DagNode {
        &mut self.nodes[handle.0 as usize]
    }

    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..self.nodes.len() as u32).map(NodeHandle)
    }

    /// Store a subblock as a fresh, unassigned node.
    pub fn insert(&mut self, subblock: SubBlock) -> NodeHandle {
        let node = DagNode::new(subblock);
        let handle = NodeHandle(self.nodes.len() as u32);
        self.by_hash.insert(node.hash, handle);
        self.nodes.push(node);
        handle
    }

    /// Wire `ancestor -> descendant` in both directions.
    pub fn add_edge(&mut self, ancestor: NodeHandle, descendant: NodeHandle) {
        self.nodes[ancestor.0 as usize].descendants.insert(descendant);
        self.nodes[descendant.0 as usize].ancestors.insert(ancestor);
    }

    /// Roll back the most recent insertion, detaching its edges.
    ///
    /// Only the newest node can be removed; anything older may already
    /// be referenced by component node lists.
    pub fn remove_newest(&mut self, handle: NodeHandle) {
        assert_eq!(
            handle.0 as usize,
            self.nodes.len() - 1,
            "only the newest node can be rolled back"
        );
        let node = self.nodes.pop().expect("nonempty arena");
        self.by_hash.remove(&node.hash);
        for ancestor in node.ancestors {
            self.nodes[ancestor.0 as usize].descendants.remove(&handle);
        }
        for descendant in node.descendants {
            self.nodes[descendant.0 as usize].ancestors.remove(&handle);
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_hash.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::subblock_with;

    #[test]
    fn test_insert_and_lookup() {
        let mut arena = NodeArena::new();
        let subblock = subblock_with(1, &[]);
        let hash = subblock.hash();
        let handle = arena.insert(subblock);
        assert_eq!(arena.handle_of(&hash), Some(handle));
        assert!(arena.node(handle).is_base());
        assert!(arena.node(handle).is_tip());
        assert!(!arena.node(handle).is_assigned());
    }

    #[test]
    fn test_edges_are_bidirectional() {
        let mut arena = NodeArena::new();
        let a = arena.insert(subblock_with(1, &[]));
        let b = arena.insert(subblock_with(2, &[]));
        arena.add_edge(a, b);
        assert!(arena.node(a).descendants.contains(&b));
        assert!(arena.node(b).ancestors.contains(&a));
        assert!(!arena.node(a).is_tip());
        assert!(!arena.node(b).is_base());
    }

    #[test]
    fn test_remove_newest_detaches_edges() {
        let mut arena = NodeArena::new();
        let a = arena.insert(subblock_with(1, &[]));
        let rejected = subblock_with(2, &[]);
        let hash = rejected.hash();
        let b = arena.insert(rejected);
        arena.add_edge(a, b);
        arena.remove_newest(b);
        assert_eq!(arena.len(), 1);
        assert!(!arena.contains(&hash));
        assert!(arena.node(a).is_tip(), "dangling edge must be gone");
    }
}
