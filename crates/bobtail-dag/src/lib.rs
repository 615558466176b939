//! # Subblock DAG
//!
//! Directed acyclic graph of subblocks (weak proofs of work carrying
//! transactions), partitioned into maximal conflict-free components.
//!
//! Nodes live in a central arena addressed by 32-bit handles; components
//! hold handle lists, the outpoints their transactions spend, a score
//! from a level-stratified accumulation, and the ids of components they
//! conflict with. Inserting a subblock that bridges several components
//! merges them into the lowest-numbered one; components are never split
//! and nodes never leave the graph.
//!
//! The best component (at least `bobtail_k` nodes, highest score) and
//! the tips of every component compatible with it feed the miner's
//! choice of ancestors for the next subblock.

pub mod domain;
pub mod error;
pub mod service;

pub use domain::{
    check_subblock_form, DagConfig, DagNode, NodeArena, NodeHandle, SubblockDag,
    DEFAULT_BOBTAIL_K,
};
pub use error::{DagError, SubBlockFormError};
pub use service::{process_new_subblock, process_stored_subblock, SilentRelay, SubBlockRelay};
