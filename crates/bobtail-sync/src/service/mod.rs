//! Protocol orchestration.
//!
//! [`MempoolSyncService`] owns the session registry and drives both
//! sides of the exchange through the outbound ports. Handlers hold locks
//! only for bookkeeping; every `send` happens outside them.

mod requester;
mod responder;

use std::collections::BTreeMap;
use std::sync::Arc;

use shared_types::{Hash, PeerId};
use tracing::debug;

use crate::domain::config::{SyncConfig, MAX_PEER_HEIGHT_LAG};
use crate::domain::messages::MempoolSyncInfo;
use crate::domain::registry::SyncRegistry;
use crate::domain::short_id::{derive_session_keys, short_id};
use crate::domain::version::negotiate_version;
use crate::error::{SyncError, ViolationKind};
use crate::ports::outbound::{
    AdmissionQueue, ChainView, EntropySource, MempoolView, MisbehaviorSink, OrphanPoolView,
    PeerLink, TimeSource, VersionKey,
};

/// Host-supplied collaborators, bundled for injection.
#[derive(Clone)]
pub struct SyncPorts {
    pub mempool: Arc<dyn MempoolView>,
    pub orphan_pool: Arc<dyn OrphanPoolView>,
    pub admission: Arc<dyn AdmissionQueue>,
    pub misbehavior: Arc<dyn MisbehaviorSink>,
    pub time: Arc<dyn TimeSource>,
    pub entropy: Arc<dyn EntropySource>,
    pub chain: Arc<dyn ChainView>,
}

/// The mempool synchronization core.
pub struct MempoolSyncService {
    config: SyncConfig,
    ports: SyncPorts,
    registry: SyncRegistry,
}

impl MempoolSyncService {
    pub fn new(config: SyncConfig, ports: SyncPorts) -> Self {
        Self {
            config,
            ports,
            registry: SyncRegistry::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    /// The host must call this when a peer disconnects; stale sessions
    /// keyed by a recycled peer id would otherwise leak across
    /// connections.
    pub fn peer_disconnected(&self, peer: PeerId) {
        self.registry.remove_peer(peer);
    }

    /// Session parameters describing our side, sent with a request.
    pub fn build_sync_info(&self) -> MempoolSyncInfo {
        let n_tx = self.ports.mempool.tx_count() + self.ports.orphan_pool.hashes().len() as u64;
        let remaining = self
            .config
            .max_mempool_bytes
            .saturating_sub(self.ports.mempool.total_tx_bytes());
        let (k0, k1) = derive_session_keys(self.ports.entropy.random_u64());
        MempoolSyncInfo {
            n_tx_in_mempool: n_tx,
            n_remaining_mempool_bytes: remaining,
            shorttxid_k0: k0,
            shorttxid_k1: k1,
            n_satoshi_per_k: self.ports.mempool.min_fee_per_k(),
        }
    }

    /// Pick a random peer eligible for synchronization.
    ///
    /// Eligible means: the capability is advertised, a common version
    /// exists, and the peer's best-known and last-common heights are both
    /// within [`MAX_PEER_HEIGHT_LAG`] of our tip (it is not deep in
    /// initial block download).
    pub fn select_sync_peer(
        &self,
        peers: &[Arc<dyn PeerLink>],
    ) -> Option<Arc<dyn PeerLink>> {
        let tip = self.ports.chain.tip_height();
        let syncable: Vec<&Arc<dyn PeerLink>> = peers
            .iter()
            .filter(|peer| {
                if !peer.supports_mempool_sync() {
                    return false;
                }
                if self.negotiate_with(peer.as_ref()).is_err() {
                    debug!(peer = %peer.log_name(), "skipping peer: no common version");
                    return false;
                }
                peer.common_height() >= tip - MAX_PEER_HEIGHT_LAG
                    && peer.best_known_height() >= tip - MAX_PEER_HEIGHT_LAG
            })
            .collect();
        if syncable.is_empty() {
            return None;
        }
        let choice = self.ports.entropy.random_index(syncable.len());
        Some(Arc::clone(syncable[choice]))
    }

    /// Negotiate the session version with one peer.
    pub fn negotiate_with(&self, peer: &dyn PeerLink) -> Result<u64, SyncError> {
        negotiate_version(
            self.config.min_version_supported,
            self.config.max_version_supported,
            peer.extended_version(VersionKey::MempoolSyncMinVersion),
            peer.extended_version(VersionKey::MempoolSyncMaxVersion),
        )
    }

    /// Every transaction hash we could serve or already hold: orphans
    /// first, then the mempool.
    pub(crate) fn pool_hashes(&self) -> Vec<Hash> {
        let mut hashes = self.ports.orphan_pool.hashes();
        hashes.extend(self.ports.mempool.query_hashes());
        hashes
    }

    /// Short ids of everything in [`Self::pool_hashes`] under session
    /// keys, mapped back to the full hashes.
    pub(crate) fn pool_short_ids(&self, k0: u64, k1: u64) -> BTreeMap<u64, Hash> {
        self.pool_hashes()
            .into_iter()
            .map(|hash| (short_id(k0, k1, &hash), hash))
            .collect()
    }

    /// Report a violation to the misbehavior sink and build the error.
    pub(crate) fn violation(&self, peer: PeerId, kind: ViolationKind) -> SyncError {
        let score = kind.score();
        self.ports.misbehavior.misbehave(peer, score);
        SyncError::ProtocolViolation { peer, kind, score }
    }

    pub(crate) fn ports(&self) -> &SyncPorts {
        &self.ports
    }
}
