//! Bloom filter over 64-bit short transaction ids.
//!
//! A Bloom filter is a space-efficient probabilistic membership test.
//! False positives are possible, false negatives are not; graphene leans
//! on exactly that asymmetry, sizing the filter so the expected number of
//! false positives equals the IBLT's decoding capacity.

use std::io::Cursor;

use bitvec::prelude::*;
use shared_types::{ByteReader, ByteWriter, WireError};

/// Double-hashing position schedule: `h(i) = h1 + i * h2` over the
/// filter's bit space, both legs 32-bit MurmurHash3 under distinct seeds.
fn hash_positions(element: &[u8], k: u8, m_bits: usize, tweak: u32) -> Vec<usize> {
    let h1 = murmur(element, tweak);
    let h2 = murmur(element, tweak.wrapping_add(1));
    (0..u64::from(k))
        .map(|i| (h1.wrapping_add(i.wrapping_mul(h2)) % m_bits as u64) as usize)
        .collect()
}

fn murmur(element: &[u8], seed: u32) -> u64 {
    let mut cursor = Cursor::new(element);
    u64::from(murmur3::murmur3_32(&mut cursor, seed).unwrap_or(0))
}

/// Bloom filter keyed by short ids.
///
/// A zero-bit filter is the degenerate "pass everything" filter produced
/// when the requested false-positive rate reaches 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortIdBloom {
    bits: BitVec<u8, Lsb0>,
    n_hash: u8,
    tweak: u32,
    inserted: u64,
}

impl ShortIdBloom {
    pub fn new(m_bits: usize, n_hash: u8, tweak: u32) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; m_bits],
            n_hash: n_hash.max(1),
            tweak,
            inserted: 0,
        }
    }

    /// Filter sized for `expected` elements at `target_fpr`.
    pub fn with_fpr(expected: usize, target_fpr: f64, tweak: u32) -> Self {
        let (m_bits, n_hash) = super::parameters::optimal_bloom_params(expected, target_fpr);
        Self::new(m_bits, n_hash, tweak)
    }

    pub fn insert(&mut self, short_id: u64) {
        if self.bits.is_empty() {
            self.inserted += 1;
            return;
        }
        let element = short_id.to_le_bytes();
        for pos in hash_positions(&element, self.n_hash, self.bits.len(), self.tweak) {
            self.bits.set(pos, true);
        }
        self.inserted += 1;
    }

    /// True when the id might be in the set; never false for an inserted
    /// id.
    pub fn contains(&self, short_id: u64) -> bool {
        if self.bits.is_empty() {
            return true;
        }
        let element = short_id.to_le_bytes();
        hash_positions(&element, self.n_hash, self.bits.len(), self.tweak)
            .into_iter()
            .all(|pos| self.bits[pos])
    }

    pub fn size_bits(&self) -> usize {
        self.bits.len()
    }

    pub fn hash_count(&self) -> u8 {
        self.n_hash
    }

    pub fn elements_inserted(&self) -> u64 {
        self.inserted
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_byte_vec(self.bits.as_raw_slice());
        w.put_compact_size(self.bits.len() as u64);
        w.put_u8(self.n_hash);
        w.put_u32(self.tweak);
        w.put_u64(self.inserted);
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let data = r.get_byte_vec()?;
        let bit_len = r.get_compact_size()? as usize;
        if bit_len > data.len() * 8 {
            return Err(WireError::OversizedLength {
                declared: bit_len as u64,
                remaining: data.len() * 8,
            });
        }
        let n_hash = r.get_u8()?;
        if n_hash == 0 {
            return Err(WireError::InvalidValue("bloom hash count 0".into()));
        }
        let tweak = r.get_u32()?;
        let inserted = r.get_u64()?;
        let mut bits = BitVec::<u8, Lsb0>::from_vec(data);
        bits.truncate(bit_len);
        Ok(Self {
            bits,
            n_hash,
            tweak,
            inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut filter = ShortIdBloom::with_fpr(200, 0.01, 7);
        let ids: Vec<u64> = (0..200u64).map(|i| i * 0x9e37_79b9 + 1).collect();
        for id in &ids {
            filter.insert(*id);
        }
        for id in &ids {
            assert!(filter.contains(*id), "inserted id {id:#x} must be found");
        }
    }

    #[test]
    fn test_false_positive_rate_bounded() {
        let target = 0.02;
        let mut filter = ShortIdBloom::with_fpr(100, target, 0);
        for i in 0..100u64 {
            filter.insert(i);
        }
        let mut false_positives = 0usize;
        let probes = 50_000u64;
        for i in 0..probes {
            if filter.contains(1_000_000 + i) {
                false_positives += 1;
            }
        }
        let observed = false_positives as f64 / probes as f64;
        assert!(
            observed <= target * 2.0,
            "observed fpr {observed} far above target {target}"
        );
    }

    #[test]
    fn test_zero_bit_filter_passes_everything() {
        let mut filter = ShortIdBloom::new(0, 1, 0);
        filter.insert(1);
        assert!(filter.contains(1));
        assert!(filter.contains(2));
        assert_eq!(filter.elements_inserted(), 1);
    }

    #[test]
    fn test_tweak_changes_positions() {
        let mut a = ShortIdBloom::new(1024, 4, 0);
        let mut b = ShortIdBloom::new(1024, 4, 999);
        for i in 0..10u64 {
            a.insert(i);
            b.insert(i);
        }
        assert_ne!(a.bits, b.bits, "distinct tweaks must scatter differently");
    }

    #[test]
    fn test_wire_round_trip() {
        let mut filter = ShortIdBloom::with_fpr(50, 0.05, 3);
        for i in 0..50u64 {
            filter.insert(i * 13);
        }
        let mut w = ByteWriter::new();
        filter.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let decoded = ShortIdBloom::decode(&mut r).expect("decode");
        r.finish().expect("no trailing bytes");
        assert_eq!(decoded, filter);
    }

    #[test]
    fn test_decode_rejects_zero_hashes() {
        let filter = ShortIdBloom::new(64, 3, 0);
        let mut w = ByteWriter::new();
        filter.encode(&mut w);
        let mut bytes = w.into_bytes();
        // hash-count byte sits after the data vec and the bit-length.
        let idx = bytes.len() - 4 - 8 - 1;
        bytes[idx] = 0;
        let mut r = ByteReader::new(&bytes);
        assert!(ShortIdBloom::decode(&mut r).is_err());
    }
}
