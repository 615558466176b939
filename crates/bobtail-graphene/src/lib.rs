//! # Graphene Set
//!
//! Bloom filter + IBLT composite enabling set reconciliation with
//! bandwidth proportional to the symmetric difference rather than the
//! set sizes.
//!
//! The sender inserts every short id into a Bloom filter sized so that
//! roughly `a*` of the receiver's non-matching candidates leak through,
//! and into an IBLT sized to absorb exactly that leakage plus whatever
//! the receiver genuinely lacks. The receiver reconstructs the sender's
//! set from its own candidates and learns precisely which ids to fetch.
//!
//! ## Layers
//!
//! - `domain::bloom` — membership filter over 64-bit short ids
//! - `domain::parameters` — cost model picking the difference budget
//! - `domain::graphene_set` — the composite sketch and its wire format

pub mod domain;
pub mod error;

pub use domain::{
    GrapheneConfig, GrapheneSet, Reconciled, ShortIdBloom, GRAPHENE_SET_VERSION,
};
pub use error::GrapheneError;
