//! Synchronization configuration.

use bobtail_graphene::GrapheneConfig;

/// Synchronization frequency floor per peer, in microseconds.
pub const MEMPOOLSYNC_FREQ_US: u64 = 30 * 1_000_000;

/// Clock-skew allowance subtracted from the frequency floor when judging
/// an early request.
pub const MEMPOOLSYNC_FREQ_GRACE_US: u64 = 5 * 1_000_000;

/// Oldest protocol version this build can speak.
pub const DEFAULT_MIN_VERSION_SUPPORTED: u64 = 0;

/// Newest protocol version this build can speak.
pub const DEFAULT_MAX_VERSION_SUPPORTED: u64 = 0;

/// A peer is syncable only while its chain height is within this many
/// blocks of our tip.
pub const MAX_PEER_HEIGHT_LAG: i64 = 10;

/// Default mempool capacity used when budgeting a response, in bytes.
pub const DEFAULT_MAX_MEMPOOL_BYTES: u64 = 300 * 1_000_000;

/// Host-tunable knobs for the synchronization core.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Gate: when false the responder rejects every request.
    pub sync_mempool_with_peers: bool,
    /// Lower bound of the advertised protocol version range.
    pub min_version_supported: u64,
    /// Upper bound of the advertised protocol version range.
    pub max_version_supported: u64,
    /// Mempool capacity cap used when computing remaining byte budget.
    pub max_mempool_bytes: u64,
    /// Sketch tunables handed through to the graphene layer.
    pub graphene: GrapheneConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_mempool_with_peers: true,
            min_version_supported: DEFAULT_MIN_VERSION_SUPPORTED,
            max_version_supported: DEFAULT_MAX_VERSION_SUPPORTED,
            max_mempool_bytes: DEFAULT_MAX_MEMPOOL_BYTES,
            graphene: GrapheneConfig::default(),
        }
    }
}
