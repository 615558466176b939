//! # Invertible Bloom Lookup Table
//!
//! Compact multiset sketch supporting insert, erase, point lookup, full
//! enumeration by peeling, and cellwise subtraction. Subtracting one
//! table from another and peeling the result recovers the symmetric
//! difference of the two underlying key/value sets, which is what the
//! graphene reconciliation layer builds on.
//!
//! Two wire formats coexist:
//!
//! - [`Iblt`] (v1) stores a 32-bit key checksum inline in every cell.
//! - [`PackedChecksumIblt`] (v2) moves the checksums into one packed
//!   bitmap with a configurable width of 1..=32 bits per cell.
//!
//! Table sizing comes from a measured parameter table
//! ([`domain::parameters`]): the expected entry count picks an overhead
//! factor and a hash-function count, and the cell vector is split into
//! one stripe per hash function.
//!
//! ## References
//!
//! - "What's the Difference? Efficient Set Reconciliation without Prior
//!   Context" (Eppstein, Goodrich, Uyeda, Varghese)
//! - "Invertible Bloom Lookup Tables" (Goodrich, Mitzenmacher)

pub mod domain;
pub mod error;

pub use domain::{
    EntryListing, Iblt, LookupResult, PackedChecksumIblt, DEFAULT_CHECKSUM_BITS, MIN_OVERHEAD,
    V1_WIRE_VERSION, V2_WIRE_VERSION,
};
pub use error::IbltError;
