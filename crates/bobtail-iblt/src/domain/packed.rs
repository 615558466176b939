//! v2 table: checksums packed into a table-wide bitmap.
//!
//! v2 drops the 32-bit inline checksum from every cell and keeps a
//! configurable `b`-bit checksum per cell in one contiguous bit vector,
//! shrinking the wire size whenever fewer checksum bits suffice.

use std::collections::BTreeMap;

use bitvec::prelude::*;
use shared_types::{ByteReader, ByteWriter};

use super::cell::PackedCell;
use super::hashing::{key_bytes, key_checksum_in, murmur, seeds_from_salt};
use super::parameters;
use super::table::{EntryListing, LookupResult, MIN_OVERHEAD};
use crate::error::IbltError;

/// The only v2 wire version so far.
pub const V2_WIRE_VERSION: u64 = 2;

/// Default checksum width. Matches the inline checksum of v1 tables.
pub const DEFAULT_CHECKSUM_BITS: u8 = 32;

/// Invertible Bloom Lookup Table, v2 wire format with packed checksums.
///
/// Same cell algebra as [`super::table::Iblt`]; purity and emptiness read
/// the cell's checksum out of the shared bitmap, reduced modulo `2^b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedChecksumIblt {
    version: u64,
    salt: u32,
    n_hash: u8,
    hash_seeds: BTreeMap<u8, u32>,
    is_modified: bool,
    cells: Vec<PackedCell>,
    checksum_bits: u8,
    checksums: BitVec<u8, Lsb0>,
}

impl PackedChecksumIblt {
    /// Table sized for `expected_entries` with the default 32 checksum
    /// bits per cell.
    pub fn new(expected_entries: usize, salt: u32) -> Self {
        Self::with_checksum_bits(expected_entries, salt, DEFAULT_CHECKSUM_BITS)
            .expect("default checksum width is always valid")
    }

    /// Table with an explicit checksum width in `1..=32` bits.
    pub fn with_checksum_bits(
        expected_entries: usize,
        salt: u32,
        checksum_bits: u8,
    ) -> Result<Self, IbltError> {
        if checksum_bits == 0 || checksum_bits > 32 {
            return Err(IbltError::InvalidChecksumBits(checksum_bits));
        }
        let mut table = Self {
            version: V2_WIRE_VERSION,
            salt,
            n_hash: 0,
            hash_seeds: BTreeMap::new(),
            is_modified: false,
            cells: Vec::new(),
            checksum_bits,
            checksums: BitVec::new(),
        };
        table.resize(expected_entries)?;
        Ok(table)
    }

    /// Re-parameterize for a new expected entry count. Only legal while
    /// the table has never been written to.
    pub fn resize(&mut self, expected_entries: usize) -> Result<(), IbltError> {
        if self.is_modified {
            return Err(IbltError::ResizeAfterModify);
        }
        self.n_hash = parameters::optimal_n_hash(expected_entries);
        self.hash_seeds = seeds_from_salt(self.salt, self.n_hash)
            .into_iter()
            .enumerate()
            .map(|(i, seed)| (i as u8, seed))
            .collect();
        // The measured overheads are stored as rounded decimals; nudge the
        // product down so the ceiling lands on the intended cell count.
        let mut cells = (expected_entries as f64
            * f64::from(parameters::optimal_overhead(expected_entries))
            - 1e-3)
            .ceil()
            .max(0.0) as usize;
        while cells % usize::from(self.n_hash) != 0 {
            cells += 1;
        }
        self.cells = vec![PackedCell::default(); cells];
        self.checksums = bitvec![u8, Lsb0; 0; cells * usize::from(self.checksum_bits)];
        Ok(())
    }

    /// An unwritten table with identical parameters.
    pub fn clone_empty(&self) -> Self {
        Self {
            version: self.version,
            salt: self.salt,
            n_hash: self.n_hash,
            hash_seeds: self.hash_seeds.clone(),
            is_modified: false,
            cells: vec![PackedCell::default(); self.cells.len()],
            checksum_bits: self.checksum_bits,
            checksums: bitvec![u8, Lsb0; 0; self.checksums.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn n_hash(&self) -> u8 {
        self.n_hash
    }

    pub fn salt(&self) -> u32 {
        self.salt
    }

    pub fn checksum_bits(&self) -> u8 {
        self.checksum_bits
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn reset(&mut self) {
        let cells = self.cells.len();
        self.cells.clear();
        self.cells.resize(cells, PackedCell::default());
        self.checksums.fill(false);
        self.is_modified = false;
    }

    fn checksum_space(&self) -> u64 {
        1u64 << self.checksum_bits
    }

    /// Cell checksum, assembled least-significant-bit first.
    fn read_checksum(&self, cell_idx: usize) -> u32 {
        let base = cell_idx * usize::from(self.checksum_bits);
        let mut checksum = 0u32;
        for bit in 0..usize::from(self.checksum_bits) {
            if self.checksums[base + bit] {
                checksum |= 1 << bit;
            }
        }
        checksum
    }

    fn write_checksum(&mut self, cell_idx: usize, checksum: u32) {
        let base = cell_idx * usize::from(self.checksum_bits);
        for bit in 0..usize::from(self.checksum_bits) {
            self.checksums.set(base + bit, (checksum >> bit) & 1 == 1);
        }
    }

    pub fn insert(&mut self, key: u64, value: &[u8]) {
        self.apply(1, key, value);
    }

    pub fn erase(&mut self, key: u64, value: &[u8]) {
        self.apply(-1, key, value);
    }

    fn seed_for(&self, hash_idx: u8) -> u32 {
        self.hash_seeds.get(&hash_idx).copied().unwrap_or(0)
    }

    fn apply(&mut self, delta: i32, key: u64, value: &[u8]) {
        if self.n_hash == 0 {
            return;
        }
        let buckets = self.cells.len() / usize::from(self.n_hash);
        if buckets == 0 {
            return;
        }
        let kvec = key_bytes(key);
        let kchk = key_checksum_in(key, self.checksum_space());
        for i in 0..self.n_hash {
            let h = murmur(self.seed_for(i), &kvec);
            let idx = usize::from(i) * buckets + h as usize % buckets;
            let checksum = self.read_checksum(idx) ^ kchk;
            self.write_checksum(idx, checksum);
            let cell = &mut self.cells[idx];
            cell.count += delta;
            cell.key_sum ^= key;
            if cell.is_empty(checksum) {
                cell.value_sum.clear();
            } else {
                cell.add_value(value);
            }
        }
        self.is_modified = true;
    }

    /// Point lookup; peels a working copy when the addressed cells are
    /// not decisive.
    pub fn get(&self, key: u64) -> LookupResult {
        let space = self.checksum_space();
        let mut peeled = self.clone();
        loop {
            match peeled.get_addressed(key) {
                Some(result) => return result,
                None => {
                    let mut erased = 0usize;
                    for i in 0..peeled.cells.len() {
                        let checksum = peeled.read_checksum(i);
                        if !peeled.cells[i].is_pure(checksum, space) {
                            continue;
                        }
                        if peeled.cells[i].key_sum == key {
                            return LookupResult::Found(peeled.cells[i].value_sum.clone());
                        }
                        let count = peeled.cells[i].count;
                        let key_sum = peeled.cells[i].key_sum;
                        let value = peeled.cells[i].value_sum.clone();
                        peeled.apply(-count, key_sum, &value);
                        erased += 1;
                    }
                    if erased == 0 {
                        return LookupResult::Unknown;
                    }
                }
            }
        }
    }

    fn get_addressed(&self, key: u64) -> Option<LookupResult> {
        if self.n_hash == 0 {
            return Some(LookupResult::Unknown);
        }
        let buckets = self.cells.len() / usize::from(self.n_hash);
        if buckets == 0 {
            return Some(LookupResult::Unknown);
        }
        let space = self.checksum_space();
        let kvec = key_bytes(key);
        for i in 0..self.n_hash {
            let h = murmur(self.seed_for(i), &kvec);
            let idx = usize::from(i) * buckets + h as usize % buckets;
            let checksum = self.read_checksum(idx);
            let cell = &self.cells[idx];
            if cell.is_empty(checksum) {
                return Some(LookupResult::NotFound);
            }
            if cell.is_pure(checksum, space) {
                return Some(if cell.key_sum == key {
                    LookupResult::Found(cell.value_sum.clone())
                } else {
                    LookupResult::NotFound
                });
            }
        }
        None
    }

    /// Recover every entry by repeated peeling. The table is untouched.
    pub fn list_entries(&self) -> Result<EntryListing, IbltError> {
        let space = self.checksum_space();
        let mut peeled = self.clone();
        let mut listing = EntryListing::default();
        let bound = (self.cells.len() as f32 / MIN_OVERHEAD) as usize;
        let mut total_erased = 0usize;
        loop {
            let mut erased = 0usize;
            for i in 0..peeled.cells.len() {
                let checksum = peeled.read_checksum(i);
                if !peeled.cells[i].is_pure(checksum, space) {
                    continue;
                }
                let count = peeled.cells[i].count;
                let key_sum = peeled.cells[i].key_sum;
                let value = peeled.cells[i].value_sum.clone();
                if count == 1 {
                    listing.positive.insert((key_sum, value.clone()));
                } else {
                    listing.negative.insert((key_sum, value.clone()));
                }
                peeled.apply(-count, key_sum, &value);
                erased += 1;
            }
            total_erased += erased;
            if erased == 0 || total_erased >= bound {
                break;
            }
        }
        let emptied = peeled
            .cells
            .iter()
            .enumerate()
            .all(|(i, cell)| cell.is_empty(peeled.read_checksum(i)));
        if emptied {
            Ok(listing)
        } else {
            Err(IbltError::PeelIncomplete)
        }
    }

    /// Cellwise subtraction, sketching the symmetric difference.
    pub fn subtract(&self, other: &PackedChecksumIblt) -> Result<PackedChecksumIblt, IbltError> {
        if self.cells.len() != other.cells.len()
            || self.n_hash != other.n_hash
            || self.hash_seeds != other.hash_seeds
            || self.checksum_bits != other.checksum_bits
            || self.version != other.version
        {
            return Err(IbltError::ParameterMismatch);
        }
        let mut result = self.clone();
        for i in 0..result.cells.len() {
            let checksum = result.read_checksum(i) ^ other.read_checksum(i);
            result.write_checksum(i, checksum);
            let cell = &mut result.cells[i];
            let rhs = &other.cells[i];
            cell.count -= rhs.count;
            cell.key_sum ^= rhs.key_sum;
            if cell.is_empty(checksum) {
                cell.value_sum.clear();
            } else {
                cell.add_value(&rhs.value_sum);
            }
        }
        Ok(result)
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_compact_size(self.version);
        w.put_compact_size(self.hash_seeds.len() as u64);
        for (idx, seed) in &self.hash_seeds {
            w.put_u8(*idx);
            w.put_u32(*seed);
        }
        w.put_u32(self.salt);
        w.put_u8(self.n_hash);
        w.put_bool(self.is_modified);
        w.put_compact_size(self.cells.len() as u64);
        for cell in &self.cells {
            w.put_i32(cell.count);
            w.put_u64(cell.key_sum);
            w.put_byte_vec(&cell.value_sum);
        }
        w.put_u8(self.checksum_bits);
        // The bitmap flattens into bytes for the wire and is rebuilt on
        // read.
        w.put_byte_vec(self.checksums.as_raw_slice());
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, IbltError> {
        let version = r.get_compact_size()?;
        let mut hash_seeds = BTreeMap::new();
        let seed_count = r.get_compact_size()?;
        for _ in 0..seed_count {
            let idx = r.get_u8()?;
            let seed = r.get_u32()?;
            hash_seeds.insert(idx, seed);
        }
        let salt = r.get_u32()?;
        if version != V2_WIRE_VERSION {
            return Err(IbltError::UnknownVersion(version));
        }
        let n_hash = r.get_u8()?;
        if n_hash == 0 {
            return Err(IbltError::ZeroHashFunctions);
        }
        let is_modified = r.get_bool()?;
        let cell_count = r.get_compact_size()? as usize;
        if cell_count > r.remaining() {
            return Err(IbltError::Wire(shared_types::WireError::OversizedLength {
                declared: cell_count as u64,
                remaining: r.remaining(),
            }));
        }
        if cell_count % usize::from(n_hash) != 0 {
            return Err(IbltError::UnevenStripes {
                cells: cell_count,
                n_hash,
            });
        }
        let mut cells = Vec::with_capacity(cell_count);
        for _ in 0..cell_count {
            cells.push(PackedCell {
                count: r.get_i32()?,
                key_sum: r.get_u64()?,
                value_sum: r.get_byte_vec()?,
            });
        }
        let checksum_bits = r.get_u8()?;
        if checksum_bits == 0 || checksum_bits > 32 {
            return Err(IbltError::InvalidChecksumBits(checksum_bits));
        }
        let blocks = r.get_byte_vec()?;
        let bits_needed = cell_count * usize::from(checksum_bits);
        if blocks.len() * 8 < bits_needed {
            return Err(IbltError::ChecksumBitmapTooShort {
                have: blocks.len() * 8,
                need: bits_needed,
            });
        }
        let mut checksums = BitVec::<u8, Lsb0>::from_vec(blocks);
        checksums.truncate(bits_needed);
        Ok(Self {
            version,
            salt,
            n_hash,
            hash_seeds,
            is_modified,
            cells,
            checksum_bits,
            checksums,
        })
    }

    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, IbltError> {
        let mut r = ByteReader::new(bytes);
        let table = Self::decode(&mut r)?;
        r.finish()?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn value_of(key: u64) -> Vec<u8> {
        key.to_le_bytes()[..2].to_vec()
    }

    #[test]
    fn test_round_trip_recovers_all_entries() {
        let mut table = PackedChecksumIblt::new(25, 0x5eed);
        let entries: Vec<(u64, Vec<u8>)> =
            (1..=25u64).map(|k| (k * 31, value_of(k * 31))).collect();
        for (key, value) in &entries {
            table.insert(*key, value);
        }
        let listing = table.list_entries().expect("peel within capacity");
        assert_eq!(listing.positive, entries.iter().cloned().collect());
        assert!(listing.negative.is_empty());
    }

    #[test]
    fn test_narrow_checksums_still_decode() {
        let mut table = PackedChecksumIblt::with_checksum_bits(20, 1, 16).unwrap();
        for k in 1..=20u64 {
            table.insert(k, &value_of(k));
        }
        let listing = table.list_entries().expect("16-bit checksums suffice here");
        assert_eq!(listing.positive.len(), 20);
    }

    #[test]
    fn test_checksum_width_bounds() {
        assert_eq!(
            PackedChecksumIblt::with_checksum_bits(4, 0, 0).unwrap_err(),
            IbltError::InvalidChecksumBits(0)
        );
        assert_eq!(
            PackedChecksumIblt::with_checksum_bits(4, 0, 33).unwrap_err(),
            IbltError::InvalidChecksumBits(33)
        );
        assert!(PackedChecksumIblt::with_checksum_bits(4, 0, 1).is_ok());
        assert!(PackedChecksumIblt::with_checksum_bits(4, 0, 32).is_ok());
    }

    #[test]
    fn test_subtraction_yields_symmetric_difference() {
        let mut a = PackedChecksumIblt::new(60, 12);
        let mut b = a.clone_empty();
        for k in 1..=30u64 {
            a.insert(k, &value_of(k));
        }
        for k in 26..=35u64 {
            b.insert(k, &value_of(k));
        }
        let listing = a.subtract(&b).unwrap().list_entries().expect("difference fits");
        let only_a: BTreeSet<_> = (1..=25u64).map(|k| (k, value_of(k))).collect();
        let only_b: BTreeSet<_> = (31..=35u64).map(|k| (k, value_of(k))).collect();
        assert_eq!(listing.positive, only_a);
        assert_eq!(listing.negative, only_b);
    }

    #[test]
    fn test_insert_then_erase_restores_empty_table() {
        let empty = PackedChecksumIblt::new(10, 9);
        let mut table = empty.clone();
        table.insert(400, &value_of(400));
        table.erase(400, &value_of(400));
        let mut normalized = table.clone();
        normalized.is_modified = false;
        assert_eq!(normalized, empty);
    }

    #[test]
    fn test_get_lookup_paths() {
        let mut table = PackedChecksumIblt::new(15, 3);
        for k in 50..65u64 {
            table.insert(k, &value_of(k));
        }
        assert_eq!(table.get(57), LookupResult::Found(value_of(57)));
        assert_eq!(table.get(1_000_000), LookupResult::NotFound);
    }

    #[test]
    fn test_overload_fails_to_list() {
        let mut table = PackedChecksumIblt::new(2, 0);
        for k in 0..500u64 {
            table.insert(k, &[]);
        }
        assert_eq!(table.list_entries(), Err(IbltError::PeelIncomplete));
    }

    #[test]
    fn test_wire_round_trip() {
        let mut table = PackedChecksumIblt::with_checksum_bits(12, 0x77, 20).unwrap();
        for k in 0..12u64 {
            table.insert(k * 3 + 1, &value_of(k));
        }
        let bytes = table.to_wire_bytes();
        let decoded = PackedChecksumIblt::from_wire_bytes(&bytes).expect("decode");
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_decode_rejects_v1_and_future_versions() {
        let mut table = PackedChecksumIblt::new(4, 1);
        table.version = 1;
        assert_eq!(
            PackedChecksumIblt::from_wire_bytes(&table.to_wire_bytes()),
            Err(IbltError::UnknownVersion(1))
        );
        table.version = 3;
        assert_eq!(
            PackedChecksumIblt::from_wire_bytes(&table.to_wire_bytes()),
            Err(IbltError::UnknownVersion(3))
        );
    }

    #[test]
    fn test_decode_rejects_short_bitmap() {
        let table = PackedChecksumIblt::new(4, 1);
        let mut bytes = table.to_wire_bytes();
        // The bitmap length prefix is near the end; shrink the vector by
        // rewriting the final byte-vec as empty.
        let bitmap_len = table.checksums.as_raw_slice().len();
        bytes.truncate(bytes.len() - bitmap_len - compact_size_len(bitmap_len as u64));
        let mut w = ByteWriter::new();
        w.put_byte_vec(&[]);
        bytes.extend_from_slice(&w.into_bytes());
        assert!(matches!(
            PackedChecksumIblt::from_wire_bytes(&bytes),
            Err(IbltError::ChecksumBitmapTooShort { .. })
        ));
    }

    fn compact_size_len(v: u64) -> usize {
        match v {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }
}
