//! DAG domain: node arena, components and the component set.

pub mod arena;
pub mod component;
pub mod dag_set;
pub mod validation;

pub use arena::{DagNode, NodeArena, NodeHandle};
pub use component::DagComponent;
pub use dag_set::{DagConfig, SubblockDag, DEFAULT_BOBTAIL_K};
pub use validation::check_subblock_form;
