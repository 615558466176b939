//! v1 table: per-cell inline checksums.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::{ByteReader, ByteWriter};

use super::cell::Cell;
use super::hashing::{key_bytes, key_checksum, murmur, seeds_from_salt};
use super::parameters;
use crate::error::IbltError;

/// Peeling gives up once total evictions reach `cells / MIN_OVERHEAD`;
/// a decodable table empties long before that.
pub const MIN_OVERHEAD: f32 = 0.1;

/// Newest v1 wire version.
pub const V1_WIRE_VERSION: u64 = 1;

/// Outcome of a point lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupResult {
    /// The key is present; its value accumulator is returned.
    Found(Vec<u8>),
    /// The key is definitely absent.
    NotFound,
    /// The table is too loaded to decide.
    Unknown,
}

/// Entries recovered by a full peel.
///
/// `positive` holds net-inserted entries; `negative` holds net-erased ones
/// (for a subtraction `A − B`, the entries only `B` had).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryListing {
    pub positive: BTreeSet<(u64, Vec<u8>)>,
    pub negative: BTreeSet<(u64, Vec<u8>)>,
}

/// Invertible Bloom Lookup Table, v1 wire format.
///
/// Each of the `n_hash` hash functions owns a contiguous stripe of
/// `cells / n_hash` cells and maps every key to exactly one cell inside
/// its stripe. Insertion and erasure are symmetric XOR/count updates, so
/// subtracting one table from another leaves a sketch of the symmetric
/// difference of their contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Iblt {
    version: u64,
    salt: u32,
    n_hash: u8,
    hash_seeds: BTreeMap<u8, u32>,
    is_modified: bool,
    cells: Vec<Cell>,
}

impl Iblt {
    /// Build a table sized for `expected_entries` under the current wire
    /// version. The salt randomizes the hash functions per session.
    pub fn new(expected_entries: usize, salt: u32) -> Self {
        Self::with_version(expected_entries, salt, V1_WIRE_VERSION)
            .expect("current version is always valid")
    }

    /// Build a table under an explicit wire version (0 disables salted
    /// seeding for compatibility with the oldest peers).
    pub fn with_version(
        expected_entries: usize,
        salt: u32,
        version: u64,
    ) -> Result<Self, IbltError> {
        if version > V1_WIRE_VERSION {
            return Err(IbltError::UnknownVersion(version));
        }
        let mut table = Self {
            version,
            salt,
            n_hash: 0,
            hash_seeds: BTreeMap::new(),
            is_modified: false,
            cells: Vec::new(),
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
        self.cells = vec![Cell::default(); cells];
        Ok(())
    }

    /// An unwritten table with identical parameters, used to sketch a
    /// second set for subtraction.
    pub fn clone_empty(&self) -> Self {
        Self {
            version: self.version,
            salt: self.salt,
            n_hash: self.n_hash,
            hash_seeds: self.hash_seeds.clone(),
            is_modified: false,
            cells: vec![Cell::default(); self.cells.len()],
        }
    }

    /// Number of cells. Not the number of inserted entries.
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

    pub fn version(&self) -> u64 {
        self.version
    }

    /// True once any entry has been inserted or erased.
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Drop all entries, keeping the parameters.
    pub fn reset(&mut self) {
        let len = self.cells.len();
        self.cells.clear();
        self.cells.resize(len, Cell::default());
        self.is_modified = false;
    }

    pub fn insert(&mut self, key: u64, value: &[u8]) {
        self.apply(1, key, value);
    }

    pub fn erase(&mut self, key: u64, value: &[u8]) {
        self.apply(-1, key, value);
    }

    fn seed_for(&self, hash_idx: u8) -> u32 {
        if self.version > 0 {
            self.hash_seeds.get(&hash_idx).copied().unwrap_or(0)
        } else {
            u32::from(hash_idx)
        }
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
        let kchk = key_checksum(key);
        for i in 0..self.n_hash {
            let h = murmur(self.seed_for(i), &kvec);
            let idx = usize::from(i) * buckets + h as usize % buckets;
            let cell = &mut self.cells[idx];
            cell.count += delta;
            cell.key_sum ^= key;
            cell.key_check ^= kchk;
            if cell.is_empty() {
                cell.value_sum.clear();
            } else {
                cell.add_value(value);
            }
        }
        self.is_modified = true;
    }

    /// Point lookup. Inspects the key's own cells first and falls back to
    /// peeling a working copy when none of them is decisive.
    pub fn get(&self, key: u64) -> LookupResult {
        let mut peeled = self.clone();
        loop {
            match peeled.get_addressed(key) {
                Some(result) => return result,
                None => {
                    // Peel one pass; a pure cell with our key short-circuits.
                    let mut erased = 0usize;
                    for i in 0..peeled.cells.len() {
                        if !peeled.cells[i].is_pure() {
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

    /// Check the cells the key hashes to. `None` means undecided.
    fn get_addressed(&self, key: u64) -> Option<LookupResult> {
        if self.n_hash == 0 {
            return Some(LookupResult::Unknown);
        }
        let buckets = self.cells.len() / usize::from(self.n_hash);
        if buckets == 0 {
            return Some(LookupResult::Unknown);
        }
        let kvec = key_bytes(key);
        for i in 0..self.n_hash {
            let h = murmur(self.seed_for(i), &kvec);
            let cell = &self.cells[usize::from(i) * buckets + h as usize % buckets];
            if cell.is_empty() {
                return Some(LookupResult::NotFound);
            }
            if cell.is_pure() {
                return Some(if cell.key_sum == key {
                    LookupResult::Found(cell.value_sum.clone())
                } else {
                    LookupResult::NotFound
                });
            }
        }
        None
    }

    /// Recover every entry by repeated peeling of pure cells.
    ///
    /// The table itself is untouched; failure reports an undecodable
    /// sketch, not corruption.
    pub fn list_entries(&self) -> Result<EntryListing, IbltError> {
        let mut peeled = self.clone();
        let mut listing = EntryListing::default();
        let bound = (self.cells.len() as f32 / MIN_OVERHEAD) as usize;
        let mut total_erased = 0usize;
        loop {
            let mut erased = 0usize;
            for i in 0..peeled.cells.len() {
                if !peeled.cells[i].is_pure() {
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
        if peeled.cells.iter().all(Cell::is_empty) {
            Ok(listing)
        } else {
            Err(IbltError::PeelIncomplete)
        }
    }

    /// Cellwise subtraction. The result sketches the symmetric difference
    /// of the two underlying multisets.
    pub fn subtract(&self, other: &Iblt) -> Result<Iblt, IbltError> {
        if self.cells.len() != other.cells.len()
            || self.n_hash != other.n_hash
            || self.hash_seeds != other.hash_seeds
            || self.version != other.version
        {
            return Err(IbltError::ParameterMismatch);
        }
        let mut result = self.clone();
        for (cell, rhs) in result.cells.iter_mut().zip(&other.cells) {
            cell.count -= rhs.count;
            cell.key_sum ^= rhs.key_sum;
            cell.key_check ^= rhs.key_check;
            if cell.is_empty() {
                cell.value_sum.clear();
            } else {
                cell.add_value(&rhs.value_sum);
            }
        }
        Ok(result)
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_compact_size(self.version);
        if self.version > 0 {
            w.put_compact_size(self.hash_seeds.len() as u64);
            for (idx, seed) in &self.hash_seeds {
                w.put_u8(*idx);
                w.put_u32(*seed);
            }
            w.put_u32(self.salt);
        }
        w.put_u8(self.n_hash);
        w.put_bool(self.is_modified);
        w.put_compact_size(self.cells.len() as u64);
        for cell in &self.cells {
            w.put_i32(cell.count);
            w.put_u64(cell.key_sum);
            w.put_u32(cell.key_check);
            w.put_byte_vec(&cell.value_sum);
        }
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, IbltError> {
        let version = r.get_compact_size()?;
        let mut hash_seeds = BTreeMap::new();
        let mut salt = 0u32;
        if version > 0 {
            let seed_count = r.get_compact_size()?;
            for _ in 0..seed_count {
                let idx = r.get_u8()?;
                let seed = r.get_u32()?;
                hash_seeds.insert(idx, seed);
            }
            salt = r.get_u32()?;
        }
        if version > V1_WIRE_VERSION {
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
            cells.push(Cell {
                count: r.get_i32()?,
                key_sum: r.get_u64()?,
                key_check: r.get_u32()?,
                value_sum: r.get_byte_vec()?,
            });
        }
        Ok(Self {
            version,
            salt,
            n_hash,
            hash_seeds,
            is_modified,
            cells,
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
