//! The component set.
//!
//! [`SubblockDag`] owns the node arena and the ordered component vector
//! behind one read/write lock. Insertion wires edges, routes the node to
//! a component (creating or merging components as the ancestor set
//! dictates) and keeps the `index == id` numbering invariant.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use shared_types::{short_hex, Hash, SubBlock};
use tracing::{debug, error, info};

use super::arena::{NodeArena, NodeHandle};
use super::component::DagComponent;
use crate::error::DagError;

/// Default minimum component size eligible for block assembly.
pub const DEFAULT_BOBTAIL_K: usize = 7;

/// DAG tunables.
#[derive(Clone, Copy, Debug)]
pub struct DagConfig {
    /// Minimum node count before a component can back a block, and the
    /// k of the k-order-statistic proof of work.
    pub bobtail_k: usize,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            bobtail_k: DEFAULT_BOBTAIL_K,
        }
    }
}

#[derive(Default)]
struct DagState {
    arena: NodeArena,
    components: Vec<DagComponent>,
}

/// The set of all known subblocks, partitioned into conflict-free
/// components.
///
/// Readers (`contains`, `find`, `size`, `tips`, `best_dag`) take the
/// lock shared; `insert` and `clear` take it exclusive. Nodes are never
/// deleted and components are only ever merged, never split.
pub struct SubblockDag {
    config: DagConfig,
    inner: RwLock<DagState>,
}

impl SubblockDag {
    pub fn new(config: DagConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(DagState::default()),
        }
    }

    pub fn config(&self) -> &DagConfig {
        &self.config
    }

    /// Number of nodes across all components.
    pub fn size(&self) -> usize {
        self.inner.read().arena.len()
    }

    pub fn component_count(&self) -> usize {
        self.inner.read().components.len()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.read().arena.contains(hash)
    }

    /// Fetch a subblock by hash.
    pub fn find(&self, hash: &Hash) -> Option<SubBlock> {
        let state = self.inner.read();
        let handle = state.arena.handle_of(hash)?;
        Some(state.arena.node(handle).subblock.clone())
    }

    /// Component id a subblock currently belongs to.
    pub fn component_of(&self, hash: &Hash) -> Option<i16> {
        let state = self.inner.read();
        let handle = state.arena.handle_of(hash)?;
        Some(state.arena.node(handle).dag_id)
    }

    /// Score of the component at `id`.
    pub fn component_score(&self, id: i16) -> Option<u64> {
        self.inner
            .read()
            .components
            .get(usize::try_from(id).ok()?)
            .map(|component| component.score)
    }

    pub fn clear(&self) {
        let mut state = self.inner.write();
        state.arena.clear();
        state.components.clear();
    }

    /// Insert a subblock, wiring it to every known ancestor.
    ///
    /// - no known ancestor: a fresh singleton component;
    /// - ancestors in one component: join it, unless the node's spends
    ///   conflict with it;
    /// - ancestors in several components: merge them all into the
    ///   lowest-numbered one, then join.
    pub fn insert(&self, subblock: SubBlock) -> Result<(), DagError> {
        let mut state = self.inner.write();
        let hash = subblock.hash();
        if state.arena.contains(&hash) {
            return Err(DagError::DuplicateSubblock(hash));
        }

        let ancestor_hashes: Vec<Hash> = subblock.ancestor_hashes().to_vec();
        let handle = state.arena.insert(subblock);

        let mut merge_list: BTreeSet<i16> = BTreeSet::new();
        for ancestor_hash in &ancestor_hashes {
            let Some(ancestor) = state.arena.handle_of(ancestor_hash) else {
                // Ancestor not relayed to us yet; the edge appears when
                // it arrives referencing nothing (it cannot), so it is
                // simply skipped.
                debug!(
                    ancestor = %short_hex(ancestor_hash),
                    "ancestor unknown while inserting subblock"
                );
                continue;
            };
            state.arena.add_edge(ancestor, handle);
            merge_list.insert(state.arena.node(ancestor).dag_id);
        }

        let new_id: i16 = match merge_list.len() {
            0 => {
                Self::create_component(&mut state, handle);
                debug!(subblock = %short_hex(&hash), "subblock opened a new component");
                return Ok(());
            }
            1 => *merge_list.iter().next().expect("nonempty"),
            _ => Self::merge_components(&mut state, merge_list)?,
        };

        let state = &mut *state;
        state.arena.node_mut(handle).dag_id = new_id;
        let component = &mut state.components[new_id as usize];
        if !component.check_compatibility(&state.arena, handle) {
            // The node double-spends against its own ancestors'
            // component; drop it entirely so every stored node keeps a
            // home component.
            state.arena.remove_newest(handle);
            return Err(DagError::ConflictingSpends { component: new_id });
        }
        let inserted = component.insert(&state.arena, handle);
        debug_assert!(inserted, "compatibility was just checked");

        for component in &mut state.components {
            if component.id() != new_id {
                component.check_compatibility(&state.arena, handle);
            }
        }
        debug!(
            subblock = %short_hex(&hash),
            component = new_id,
            "subblock inserted"
        );
        Ok(())
    }

    fn create_component(state: &mut DagState, handle: NodeHandle) {
        let new_id = state.components.len() as i16;
        let component = DagComponent::new(new_id, handle, &mut state.arena);
        state.components.push(component);
        let state = &mut *state;
        for component in &mut state.components {
            if component.id() != new_id {
                component.check_compatibility(&state.arena, handle);
            }
        }
    }

    /// Merge every component in `ids` into the lowest-numbered one.
    /// Returns the surviving id.
    fn merge_components(state: &mut DagState, mut ids: BTreeSet<i16>) -> Result<i16, DagError> {
        let base = *ids.iter().next().expect("merge of at least two ids");
        ids.remove(&base);

        for id in &ids {
            if *id < 0 || usize::try_from(*id).unwrap() >= state.components.len() {
                return Err(DagError::ComponentOutOfRange(*id));
            }
        }
        let state_ref = &mut *state;
        for id in &ids {
            let handles: Vec<NodeHandle> = state_ref.components[*id as usize].nodes().to_vec();
            let base_comp = &mut state_ref.components[base as usize];
            for handle in handles {
                base_comp.absorb(&state_ref.arena, handle);
            }
        }
        {
            let base_comp = &mut state_ref.components[base as usize];
            base_comp.update_score(&state_ref.arena);
        }

        // Anything incompatible with an absorbed component becomes
        // incompatible with the survivor.
        for component in &mut state_ref.components {
            component.update_compatibility(base, &ids);
        }

        for id in ids.iter().rev() {
            state_ref.components.remove(*id as usize);
        }
        Self::renumber(state_ref);

        if !Self::ids_aligned(state_ref) {
            // Numbering went inconsistent; rebuild the partition from
            // the arena rather than run on a corrupt index.
            error!("component ids misaligned after merge; rebuilding");
            debug_assert!(false, "component ids misaligned after merge");
            Self::rebuild(state_ref);
        }
        info!(
            surviving = base,
            absorbed = ids.len(),
            "merged dag components"
        );
        Ok(base)
    }

    /// Restore `index == id`, remap incompatibility records and refresh
    /// every node's `dag_id`.
    fn renumber(state: &mut DagState) {
        let mapping: HashMap<i16, i16> = state
            .components
            .iter()
            .enumerate()
            .map(|(index, component)| (component.id(), index as i16))
            .collect();
        let state = &mut *state;
        for (index, component) in state.components.iter_mut().enumerate() {
            let new_id = index as i16;
            component.set_id(new_id);
            component.incompatible = component
                .incompatible
                .iter()
                .filter_map(|old| mapping.get(old).copied())
                .filter(|id| *id != new_id)
                .collect();
            for handle in component.nodes().to_vec() {
                state.arena.node_mut(handle).dag_id = new_id;
            }
        }
    }

    fn ids_aligned(state: &DagState) -> bool {
        state
            .components
            .iter()
            .enumerate()
            .all(|(index, component)| component.id() as usize == index)
    }

    /// Reconstruct the component partition from the arena's edges.
    fn rebuild(state: &mut DagState) {
        state.components.clear();
        let handles: Vec<NodeHandle> = state.arena.handles().collect();
        for handle in &handles {
            state.arena.node_mut(*handle).dag_id = -1;
        }
        for handle in handles {
            if state.arena.node(handle).is_assigned() {
                continue;
            }
            // Flood the connected region around this node.
            let new_id = state.components.len() as i16;
            let mut members = Vec::new();
            let mut queue = vec![handle];
            state.arena.node_mut(handle).dag_id = new_id;
            while let Some(current) = queue.pop() {
                members.push(current);
                let neighbors: Vec<NodeHandle> = {
                    let node = state.arena.node(current);
                    node.ancestors
                        .iter()
                        .chain(node.descendants.iter())
                        .copied()
                        .collect()
                };
                for neighbor in neighbors {
                    if !state.arena.node(neighbor).is_assigned() {
                        state.arena.node_mut(neighbor).dag_id = new_id;
                        queue.push(neighbor);
                    }
                }
            }
            members.sort();
            let mut component = DagComponent::new(new_id, members[0], &mut state.arena);
            for member in &members[1..] {
                component.absorb(&state.arena, *member);
            }
            component.update_score(&state.arena);
            state.components.push(component);
        }
    }

    /// Index of the best block-assembly candidate: among components
    /// holding at least `bobtail_k` nodes, the first qualifying one,
    /// displaced only by a strictly higher score.
    fn best_component_index(&self, state: &DagState) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_score: u64 = 0;
        for (index, component) in state.components.iter().enumerate() {
            if component.len() < self.config.bobtail_k {
                continue;
            }
            match best {
                None => best = Some(index),
                Some(_) if component.score > best_score => {
                    best = Some(index);
                    best_score = component.score;
                }
                Some(_) => {}
            }
        }
        best
    }

    /// Subblocks of the best component, if any component is big enough.
    pub fn best_dag(&self) -> Option<Vec<SubBlock>> {
        let state = self.inner.read();
        let best = self.best_component_index(&state)?;
        Some(
            state.components[best]
                .nodes()
                .iter()
                .map(|handle| state.arena.node(*handle).subblock.clone())
                .collect(),
        )
    }

    /// Candidate parent hashes for a new subblock: the tips of the best
    /// component plus the tips of every component it has no recorded
    /// conflict with.
    pub fn tips(&self) -> Vec<Hash> {
        let state = self.inner.read();
        let Some(best) = self.best_component_index(&state) else {
            return Vec::new();
        };
        let best_id = state.components[best].id();
        let mut eligible = vec![best];
        for (index, component) in state.components.iter().enumerate() {
            // Conflicts are recorded by whichever component saw the
            // offending node, so consult the other side's ledger.
            if index != best && !component.incompatible.contains(&best_id) {
                eligible.push(index);
            }
        }
        let mut tip_hashes = Vec::new();
        for index in eligible {
            tip_hashes.extend(state.components[index].tip_hashes(&state.arena));
        }
        debug!(
            best = best_id,
            tips = tip_hashes.len(),
            "selected subblock tips"
        );
        tip_hashes
    }
}

impl Default for SubblockDag {
    fn default() -> Self {
        Self::new(DagConfig::default())
    }
}
