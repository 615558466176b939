//! DAG error types.

use shared_types::Hash;
use thiserror::Error;

/// Structural defects in a subblock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SubBlockFormError {
    #[error("subblock carries no transactions")]
    Empty,

    #[error("first transaction is not a proofbase")]
    FirstNotProofBase,

    #[error("more than one proofbase transaction")]
    ExtraProofBase,

    #[error("subblock contains a coinbase transaction")]
    ContainsCoinBase,
}

/// Failures raised by DAG insertion and maintenance.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DagError {
    /// The subblock is already part of the graph.
    #[error("subblock already present in the dag")]
    DuplicateSubblock(Hash),

    /// The subblock double-spends an outpoint its own component already
    /// recorded for a different transaction.
    #[error("subblock conflicts with component {component}")]
    ConflictingSpends { component: i16 },

    /// The subblock is structurally invalid.
    #[error(transparent)]
    Malformed(#[from] SubBlockFormError),

    /// A referenced component id fell outside the component table.
    #[error("component id {0} out of range")]
    ComponentOutOfRange(i16),
}
