//! Protocol error types.
//!
//! Every boundary operation surfaces one of these tagged outcomes. The
//! caller decides what crosses the core boundary: protocol violations
//! have already been reported to the misbehavior sink when the error is
//! returned, negotiation failures skip the peer without penalty, and
//! reconcile failures are recovered locally.

use bobtail_graphene::GrapheneError;
use shared_types::{PeerId, WireError};
use thiserror::Error;

/// What a misbehaving peer did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// Request carried the wrong inventory type.
    WrongInventoryType,
    /// Peer asked us to sync while the capability is disabled.
    CapabilityDisabled,
    /// Request arrived inside the per-peer rate-limit window.
    RateLimited,
    /// Response for a session we never opened.
    Unrequested,
    /// Message for a session that already completed.
    StaleSession,
    /// Structurally invalid request (e.g. empty id set).
    MalformedRequest,
}

impl ViolationKind {
    /// Misbehavior score the host should apply for this violation.
    pub fn score(self) -> u32 {
        match self {
            ViolationKind::Unrequested => 10,
            ViolationKind::WrongInventoryType
            | ViolationKind::CapabilityDisabled
            | ViolationKind::RateLimited
            | ViolationKind::StaleSession
            | ViolationKind::MalformedRequest => 100,
        }
    }
}

/// Failures raised by the synchronization handlers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The peer broke the protocol; its score has already been raised
    /// through the misbehavior sink.
    #[error("protocol violation by {peer}: {kind:?} (score {score})")]
    ProtocolViolation {
        peer: PeerId,
        kind: ViolationKind,
        score: u32,
    },

    /// The advertised version ranges do not overlap. The peer is skipped,
    /// not penalized.
    #[error("peers support incompatible mempool sync versions")]
    NegotiationFailure,

    /// The graphene sketch could not be reconciled; the session completes
    /// without recovering transactions.
    #[error("graphene set could not be reconciled: {0}")]
    Reconcile(GrapheneError),

    /// Malformed payload; the connection layer should drop the peer.
    #[error("malformed payload: {0}")]
    Decode(#[from] WireError),
}
