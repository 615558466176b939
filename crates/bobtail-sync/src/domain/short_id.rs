//! Short transaction ids.
//!
//! A short id (or "cheap hash") is the 64-bit SipHash-2-4 of the full
//! 256-bit transaction id under per-session keys, so a peer cannot
//! precompute collisions against future sessions.

use std::hash::Hasher;

use sha2::{Digest, Sha256};
use siphasher::sip::SipHasher24;

use shared_types::Hash;

/// 64-bit short id of `txid` under session keys `(k0, k1)`.
pub fn short_id(k0: u64, k1: u64, txid: &Hash) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(k0, k1);
    hasher.write(txid);
    hasher.finish()
}

/// Derive a session's SipHash key pair from a random seed.
///
/// The seed's 8-byte encoding is hashed with SHA-256 and the digest's
/// first two 8-byte words become `(k0, k1)`.
pub fn derive_session_keys(seed: u64) -> (u64, u64) {
    let digest = Sha256::digest(seed.to_be_bytes());
    let k0 = u64::from_be_bytes(digest[0..8].try_into().expect("digest is 32 bytes"));
    let k1 = u64::from_be_bytes(digest[8..16].try_into().expect("digest is 32 bytes"));
    (k0, k1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_short_id_deterministic_per_keys() {
        let txid = [0xabu8; 32];
        assert_eq!(short_id(1, 2, &txid), short_id(1, 2, &txid));
        assert_ne!(short_id(1, 2, &txid), short_id(1, 3, &txid));
        assert_ne!(short_id(1, 2, &txid), short_id(2, 2, &txid));
    }

    #[test]
    fn test_short_id_collision_free_over_small_sets() {
        let mut seen = HashSet::new();
        for i in 0..10_000u32 {
            let mut txid = [0u8; 32];
            txid[..4].copy_from_slice(&i.to_le_bytes());
            assert!(
                seen.insert(short_id(7, 9, &txid)),
                "collision at index {i}"
            );
        }
    }

    #[test]
    fn test_key_derivation_spreads_seeds() {
        let (a0, a1) = derive_session_keys(1);
        let (b0, b1) = derive_session_keys(2);
        assert_ne!((a0, a1), (b0, b1));
        assert_ne!(a0, a1, "the two keys come from distinct digest words");
        assert_eq!(derive_session_keys(1), (a0, a1), "derivation is stable");
    }
}
