//! Protocol version negotiation.

use crate::error::SyncError;

/// Pick the session version from two advertised `[min, max]` ranges.
///
/// The session runs at the newest version both sides speak. Disjoint
/// ranges are a negotiation failure, not a punishable offense.
pub fn negotiate_version(
    self_min: u64,
    self_max: u64,
    peer_min: u64,
    peer_max: u64,
) -> Result<u64, SyncError> {
    let upper = self_max.min(peer_max);
    let lower = self_min.max(peer_min);
    if lower > upper {
        return Err(SyncError::NegotiationFailure);
    }
    Ok(upper)
}
