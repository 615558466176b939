//! Table implementations and their supporting pieces.

pub mod cell;
mod hashing;
pub mod packed;
pub mod parameters;
pub mod table;

pub use cell::{Cell, PackedCell};
pub use packed::{PackedChecksumIblt, DEFAULT_CHECKSUM_BITS, V2_WIRE_VERSION};
pub use table::{EntryListing, Iblt, LookupResult, MIN_OVERHEAD, V1_WIRE_VERSION};
