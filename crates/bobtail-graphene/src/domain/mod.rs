//! Sketch construction and reconciliation.

pub mod bloom;
pub mod graphene_set;
pub mod parameters;

pub use bloom::ShortIdBloom;
pub use graphene_set::{GrapheneConfig, GrapheneSet, Reconciled, GRAPHENE_SET_VERSION};
