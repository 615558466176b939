//! Cell placement and key checksum hashing.
//!
//! Keys are hashed through 32-bit MurmurHash3 over their little-endian
//! byte encoding. Each of the table's hash functions gets its own seed,
//! derived from the table salt, and owns a dedicated stripe of cells.

use std::io::Cursor;

/// Seed of the secondary hash used for key checksums.
const KEY_CHECK_SEED: u32 = 11;

/// Little-endian byte encoding of a key, the hash input everywhere.
pub(crate) fn key_bytes(key: u64) -> [u8; 8] {
    key.to_le_bytes()
}

/// 32-bit MurmurHash3 of `data` under `seed`.
pub(crate) fn murmur(seed: u32, data: &[u8]) -> u32 {
    let mut cursor = Cursor::new(data);
    murmur3::murmur3_32(&mut cursor, seed).unwrap_or(0)
}

/// Full-width key checksum, stored per cell by v1 tables.
pub(crate) fn key_checksum(key: u64) -> u32 {
    murmur(KEY_CHECK_SEED, &key_bytes(key))
}

/// Key checksum reduced to `space` values, stored in the packed bitmap by
/// v2 tables. `space` is `2^b` for `b` checksum bits.
pub(crate) fn key_checksum_in(key: u64, space: u64) -> u32 {
    (u64::from(murmur(KEY_CHECK_SEED, &key_bytes(key))) % space) as u32
}

/// Hash seeds for each hash function, derived from the table salt.
pub(crate) fn seeds_from_salt(salt: u32, n_hash: u8) -> Vec<u32> {
    let modulus = (1u64 << 32) - u64::from(n_hash);
    (0..n_hash)
        .map(|i| (u64::from(salt) % modulus + u64::from(i)) as u32)
        .collect()
}
