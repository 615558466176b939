//! The two-layer sketch.
//!
//! The sender Bloom-filters its whole id set and adds an IBLT sized for
//! the expected filter leakage. A receiver holding a candidate superset
//! runs every candidate through the filter, sketches the passing subset
//! into its own IBLT, subtracts, and peels the symmetric difference:
//! entries only the sender had are exactly the ids the receiver still
//! needs to fetch.

use std::collections::BTreeSet;

use bobtail_iblt::PackedChecksumIblt;
use shared_types::{ByteReader, ByteWriter};
use tracing::debug;

use super::bloom::ShortIdBloom;
use super::parameters::{bloom_fpr, optimal_symmetric_difference, IBLT_CELL_MINIMUM};
use crate::error::GrapheneError;

/// Sketch format version spoken by the mempool synchronization protocol.
pub const GRAPHENE_SET_VERSION: u64 = 4;

/// Tunables the host passes through from its configuration.
#[derive(Clone, Copy, Debug)]
pub struct GrapheneConfig {
    /// Entropy constant salting the IBLT hash functions and the Bloom
    /// position schedule.
    pub entropy: u32,
    /// Checksum width of the packed-checksum IBLT.
    pub checksum_bits: u8,
}

impl Default for GrapheneConfig {
    fn default() -> Self {
        Self {
            entropy: 13,
            checksum_bits: 32,
        }
    }
}

/// Result of reconciling a received sketch against local candidates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// The sender's full short-id set as reconstructed locally.
    pub sender_short_ids: BTreeSet<u64>,
    /// Sender ids absent from the candidate set; these must be fetched.
    pub missing: BTreeSet<u64>,
}

/// Bloom + IBLT composite over 64-bit short ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrapheneSet {
    version: u64,
    bloom: ShortIdBloom,
    iblt: PackedChecksumIblt,
}

impl GrapheneSet {
    /// Encode the sender side.
    ///
    /// `receiver_candidate_count` is the receiver's own estimate of how
    /// many ids it will test against the filter, as reported in its
    /// request.
    pub fn build(
        sender_short_ids: &[u64],
        receiver_candidate_count: u64,
        config: &GrapheneConfig,
    ) -> Result<Self, GrapheneError> {
        let m = sender_short_ids.len() as u64;
        if m == 0 {
            return Err(GrapheneError::EmptySenderSet);
        }
        let sym_diff = optimal_symmetric_difference(m);
        let fpr = bloom_fpr(sym_diff, receiver_candidate_count);
        let mut bloom = ShortIdBloom::with_fpr(m as usize, fpr, config.entropy);
        let mut iblt = PackedChecksumIblt::with_checksum_bits(
            sym_diff.max(IBLT_CELL_MINIMUM) as usize,
            config.entropy,
            config.checksum_bits,
        )?;
        for id in sender_short_ids {
            bloom.insert(*id);
            iblt.insert(*id, &[]);
        }
        debug!(
            sender_ids = m,
            receiver_candidates = receiver_candidate_count,
            sym_diff,
            fpr,
            bloom_bits = bloom.size_bits(),
            iblt_cells = iblt.len(),
            "assembled graphene set"
        );
        Ok(Self {
            version: GRAPHENE_SET_VERSION,
            bloom,
            iblt,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Decode the receiver side against a candidate id set.
    ///
    /// Candidates passing the Bloom filter approximate the sender's set;
    /// the IBLT subtraction recovers the exact difference. Peel entries
    /// the receiver alone holds are filter false positives and are
    /// dropped; entries the sender alone holds are returned as missing.
    pub fn reconcile(&self, candidates: &BTreeSet<u64>) -> Result<Reconciled, GrapheneError> {
        let mut passing: BTreeSet<u64> = BTreeSet::new();
        let mut local = self.iblt.clone_empty();
        for id in candidates {
            if self.bloom.contains(*id) {
                passing.insert(*id);
                local.insert(*id, &[]);
            }
        }
        let difference = local.subtract(&self.iblt)?;
        let listing = difference.list_entries()?;

        let mut sender_short_ids = passing;
        for (id, _) in &listing.positive {
            // Receiver-only: a candidate that slipped through the filter.
            sender_short_ids.remove(id);
        }
        let mut missing = BTreeSet::new();
        for (id, _) in &listing.negative {
            sender_short_ids.insert(*id);
            missing.insert(*id);
        }
        debug!(
            candidates = candidates.len(),
            false_positives = listing.positive.len(),
            missing = missing.len(),
            "reconciled graphene set"
        );
        Ok(Reconciled {
            sender_short_ids,
            missing,
        })
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_compact_size(self.version);
        self.bloom.encode(w);
        self.iblt.encode(w);
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, GrapheneError> {
        let version = r.get_compact_size()?;
        if version != GRAPHENE_SET_VERSION {
            return Err(GrapheneError::UnsupportedVersion(version));
        }
        let bloom = ShortIdBloom::decode(r)?;
        let iblt = PackedChecksumIblt::decode(r)?;
        Ok(Self {
            version,
            bloom,
            iblt,
        })
    }

    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, GrapheneError> {
        let mut r = ByteReader::new(bytes);
        let set = Self::decode(&mut r)?;
        r.finish()?;
        Ok(set)
    }
}
