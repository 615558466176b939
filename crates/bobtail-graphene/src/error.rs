//! Graphene error types.

use bobtail_iblt::IbltError;
use shared_types::WireError;
use thiserror::Error;

/// Failures raised by sketch construction, reconciliation and decoding.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GrapheneError {
    /// A sketch cannot be built over zero sender ids; the protocol layer
    /// short-circuits the exchange instead.
    #[error("sender id set is empty")]
    EmptySenderSet,

    /// The wire carried a sketch format this build does not speak.
    #[error("unsupported graphene set version {0}")]
    UnsupportedVersion(u64),

    /// The underlying table failed; during reconciliation this means the
    /// symmetric difference exceeded the sketch's capacity.
    #[error("sketch table failure: {0}")]
    Sketch(#[from] IbltError),

    /// Malformed payload underneath the sketch layout.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl GrapheneError {
    /// True when retrying with a full id exchange can still succeed.
    pub fn is_reconcile_failure(&self) -> bool {
        matches!(self, GrapheneError::Sketch(IbltError::PeelIncomplete))
    }
}
