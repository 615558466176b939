//! Conflict-free components.
//!
//! A component is a maximal set of subblocks among which no two
//! transactions spend the same outpoint differently. It tracks every
//! outpoint spent inside it, a score ranking it against sibling
//! components, and the ids of components it is known to conflict with.

use std::collections::{BTreeSet, HashMap};

use shared_types::{Hash, OutPoint};

use super::arena::{NodeArena, NodeHandle};

/// One connected, conflict-free region of the subblock graph.
#[derive(Clone, Debug)]
pub struct DagComponent {
    /// Matches this component's index in the owning set's vector.
    pub(crate) id: i16,
    /// Member nodes in insertion order.
    nodes: Vec<NodeHandle>,
    /// Outpoint -> hash of the transaction spending it.
    pub spent_outputs: HashMap<OutPoint, Hash>,
    pub score: u64,
    /// Ids of components this one cannot merge with.
    pub incompatible: BTreeSet<i16>,
}

impl DagComponent {
    /// Singleton component around `first`.
    pub fn new(id: i16, first: NodeHandle, arena: &mut NodeArena) -> Self {
        let mut component = Self {
            id,
            nodes: Vec::new(),
            spent_outputs: HashMap::new(),
            score: 0,
            incompatible: BTreeSet::new(),
        };
        arena.node_mut(first).dag_id = id;
        let inserted = component.insert(arena, first);
        debug_assert!(inserted, "a singleton component cannot conflict");
        component
    }

    pub fn id(&self) -> i16 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i16) {
        self.id = id;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Hashes of member nodes without descendants.
    pub fn tip_hashes(&self, arena: &NodeArena) -> Vec<Hash> {
        self.nodes
            .iter()
            .filter(|handle| arena.node(**handle).is_tip())
            .map(|handle| arena.node(*handle).hash)
            .collect()
    }

    /// Whether `handle`'s spends fit this component.
    ///
    /// On a conflict with a foreign node, the node's component is
    /// recorded as incompatible. A node being tested for membership in
    /// this very component is not recorded, only refused.
    pub fn check_compatibility(&mut self, arena: &NodeArena, handle: NodeHandle) -> bool {
        let node = arena.node(handle);
        if self.incompatible.contains(&node.dag_id) {
            return false;
        }
        for tx in &node.subblock.transactions {
            let tx_hash = tx.hash();
            for input in &tx.inputs {
                if let Some(spender) = self.spent_outputs.get(&input.prevout) {
                    if *spender != tx_hash {
                        if self.id != node.dag_id {
                            self.incompatible.insert(node.dag_id);
                        }
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Add a node, refusing it on a spend conflict.
    pub fn insert(&mut self, arena: &NodeArena, handle: NodeHandle) -> bool {
        let mut new_spends = Vec::new();
        {
            let node = arena.node(handle);
            for tx in &node.subblock.transactions {
                if tx.is_proof_base() {
                    continue;
                }
                let tx_hash = tx.hash();
                for input in &tx.inputs {
                    if let Some(spender) = self.spent_outputs.get(&input.prevout) {
                        if *spender != tx_hash {
                            return false;
                        }
                    }
                    new_spends.push((input.prevout, tx_hash));
                }
            }
        }
        self.spent_outputs.extend(new_spends);
        self.nodes.push(handle);
        self.update_score(arena);
        true
    }

    /// Add a node unconditionally, as during a component merge. The
    /// first recorded spender of each outpoint wins; the score is left
    /// for the caller to refresh.
    pub(crate) fn absorb(&mut self, arena: &NodeArena, handle: NodeHandle) {
        let node = arena.node(handle);
        for tx in &node.subblock.transactions {
            if tx.is_proof_base() {
                continue;
            }
            let tx_hash = tx.hash();
            for input in &tx.inputs {
                self.spent_outputs.entry(input.prevout).or_insert(tx_hash);
            }
        }
        self.nodes.push(handle);
    }

    /// Redirect incompatibility records after `old_ids` merged into
    /// `new_id`: anything incompatible with an absorbed component is
    /// incompatible with the merged one.
    pub fn update_compatibility(&mut self, new_id: i16, old_ids: &BTreeSet<i16>) {
        for old_id in old_ids {
            if self.incompatible.remove(old_id) {
                self.incompatible.insert(new_id);
            }
        }
    }

    /// Recompute the component score.
    ///
    /// Nodes are stratified into levels by shortest-path distance from
    /// any base, then accumulated from the deepest level upward:
    /// a node is worth `1 + depth · Σ score(descendants in the next
    /// level)`, and the component score is the sum over all nodes.
    pub fn update_score(&mut self, arena: &NodeArena) {
        let mut level_of: HashMap<NodeHandle, usize> = HashMap::new();
        let mut leveled: Vec<Vec<NodeHandle>> = vec![Vec::new()];
        for handle in &self.nodes {
            if arena.node(*handle).is_base() {
                leveled[0].push(*handle);
                level_of.insert(*handle, 0);
            }
        }
        loop {
            let current = leveled.len() - 1;
            let mut next = Vec::new();
            for handle in &leveled[current] {
                for desc in &arena.node(*handle).descendants {
                    if !level_of.contains_key(desc) {
                        level_of.insert(*desc, current + 1);
                        next.push(*desc);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            leveled.push(next);
        }

        let mut node_score: HashMap<NodeHandle, u64> = HashMap::new();
        let mut total: u64 = 0;
        for (depth, level) in (1..).zip(leveled.iter().rev()) {
            for handle in level {
                let level_idx = level_of[handle];
                let mut descendant_sum: u64 = 0;
                for desc in &arena.node(*handle).descendants {
                    if level_of.get(desc) == Some(&(level_idx + 1)) {
                        descendant_sum += node_score.get(desc).copied().unwrap_or(0);
                    }
                }
                let score = 1 + depth as u64 * descendant_sum;
                node_score.insert(*handle, score);
                total += score;
            }
        }
        self.score = total;
    }
}
