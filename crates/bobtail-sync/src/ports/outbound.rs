//! Outbound (driven) ports.
//!
//! Everything the synchronization core needs from the host node: pool
//! access, transaction admission, peer messaging, chain heights,
//! misbehavior scoring, time and randomness. Implementations live in the
//! host; the core never performs I/O directly.

use std::time::Instant;

use rand::Rng;
use shared_types::{Hash, PeerId, TransactionRef};

use crate::domain::messages::{Inv, MempoolSync, MempoolSyncInfo, MempoolSyncTx, RequestMempoolSyncTx};

/// Pool entry summary used to budget a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MempoolEntrySummary {
    pub hash: Hash,
    /// Serialized size in bytes.
    pub size: u64,
    /// Absolute fee in base units.
    pub fee: u64,
}

impl MempoolEntrySummary {
    /// Fee rate in base units per 1000 bytes.
    pub fn fee_per_k(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        1000 * self.fee / self.size
    }
}

/// Read access to the transaction mempool. All methods take the pool's
/// shared lock internally and must not block on network I/O.
pub trait MempoolView: Send + Sync {
    /// Entries in decreasing ancestor-fee-rate order.
    fn entries_by_ancestor_fee(&self) -> Vec<MempoolEntrySummary>;

    /// Every transaction hash currently in the pool.
    fn query_hashes(&self) -> Vec<Hash>;

    /// Fetch a transaction still resident in the pool.
    fn get(&self, hash: &Hash) -> Option<TransactionRef>;

    fn tx_count(&self) -> u64;

    /// Total serialized bytes held by the pool.
    fn total_tx_bytes(&self) -> u64;

    /// Relay fee floor in base units per 1000 bytes.
    fn min_fee_per_k(&self) -> u64;
}

/// Read access to the orphan pool.
pub trait OrphanPoolView: Send + Sync {
    fn hashes(&self) -> Vec<Hash>;
}

/// Hand-off of recovered transactions into the host's admission queue.
pub trait AdmissionQueue: Send + Sync {
    fn enqueue(&self, tx: TransactionRef, from: PeerId);
}

/// Peer penalty reporting; the host converts cumulative score into a ban.
pub trait MisbehaviorSink: Send + Sync {
    fn misbehave(&self, peer: PeerId, score: u32);
}

/// Monotonic clock, abstracted so tests can steer the rate limiter.
pub trait TimeSource: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Randomness, abstracted so tests are deterministic.
pub trait EntropySource: Send + Sync {
    fn random_u64(&self) -> u64;

    /// Uniform index in `0..n`. `n` must be nonzero.
    fn random_index(&self, n: usize) -> usize;
}

/// Thread-local OS randomness.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropySource;

impl EntropySource for OsEntropySource {
    fn random_u64(&self) -> u64 {
        rand::thread_rng().gen()
    }

    fn random_index(&self, n: usize) -> usize {
        rand::thread_rng().gen_range(0..n)
    }
}

/// Chain-tip view.
pub trait ChainView: Send + Sync {
    /// Height of the active chain tip, -1 before genesis.
    fn tip_height(&self) -> i64;
}

/// Extended-version keys a peer advertises during the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionKey {
    MempoolSyncMinVersion,
    MempoolSyncMaxVersion,
}

/// A protocol message headed for one peer.
#[derive(Clone, Debug)]
pub enum SyncMessage {
    GetMempoolSync(Inv, MempoolSyncInfo),
    MempoolSync(MempoolSync),
    GetMempoolSyncTx(RequestMempoolSyncTx),
    MempoolSyncTx(MempoolSyncTx),
}

/// Handle to one connected peer.
pub trait PeerLink: Send + Sync {
    fn id(&self) -> PeerId;

    /// Human-readable name for log lines.
    fn log_name(&self) -> String;

    /// Whether the peer advertised the mempool sync capability at all.
    fn supports_mempool_sync(&self) -> bool;

    /// Value the peer advertised for `key` in the extended handshake.
    fn extended_version(&self, key: VersionKey) -> u64;

    /// Height of the best header the peer announced, -1 if unknown.
    fn best_known_height(&self) -> i64;

    /// Height of the last block in common with the peer, -1 if unknown.
    fn common_height(&self) -> i64;

    /// Queue a message for delivery. Must not block.
    fn send(&self, message: SyncMessage);
}
