//! IBLT error types.

use shared_types::WireError;
use thiserror::Error;

/// Failures surfaced by table operations and the wire codec.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IbltError {
    /// `resize` called after entries were inserted.
    #[error("table already holds entries and cannot be resized")]
    ResizeAfterModify,

    /// Subtraction across tables built with different parameters.
    #[error("subtraction requires identical size, hash count and seeds")]
    ParameterMismatch,

    /// Peeling stopped before the table emptied; the symmetric difference
    /// exceeded what the table was sized for.
    #[error("peeling could not empty the table")]
    PeelIncomplete,

    /// Serialized table carries a version this build does not know.
    #[error("unknown table version {0}")]
    UnknownVersion(u64),

    /// Serialized table declares no hash functions.
    #[error("hash-function count must be greater than zero")]
    ZeroHashFunctions,

    /// Cell vector cannot be split into equal per-hash stripes.
    #[error("{cells} cells cannot be striped over {n_hash} hash functions")]
    UnevenStripes { cells: usize, n_hash: u8 },

    /// Checksum width outside the supported 1..=32 bits.
    #[error("checksum width {0} outside 1..=32 bits")]
    InvalidChecksumBits(u8),

    /// Packed checksum bitmap shorter than the cell vector requires.
    #[error("checksum bitmap holds {have} bits, table needs {need}")]
    ChecksumBitmapTooShort { have: usize, need: usize },

    /// Malformed payload underneath the table layout.
    #[error(transparent)]
    Wire(#[from] WireError),
}
