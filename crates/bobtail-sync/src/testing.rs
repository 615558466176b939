//! Test doubles for the outbound ports.
//!
//! Shared by this crate's unit tests and the workspace integration
//! tests, which wire two services back-to-back through [`MockPeer`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::{Hash, PeerId, Transaction, TransactionRef};

use crate::domain::config::SyncConfig;
use crate::ports::outbound::{
    AdmissionQueue, ChainView, EntropySource, MempoolEntrySummary, MempoolView, MisbehaviorSink,
    OrphanPoolView, PeerLink, SyncMessage, TimeSource, VersionKey,
};
use crate::service::{MempoolSyncService, SyncPorts};

#[derive(Clone)]
struct PoolEntry {
    tx: TransactionRef,
    fee: u64,
    size: u64,
}

/// In-memory mempool with explicit fees.
#[derive(Default)]
pub struct MockMempool {
    entries: Mutex<HashMap<Hash, PoolEntry>>,
    min_fee_per_k: AtomicU64,
}

impl MockMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, tx: Transaction, fee: u64) -> Hash {
        self.add_ref(Arc::new(tx), fee)
    }

    pub fn add_ref(&self, tx: TransactionRef, fee: u64) -> Hash {
        let hash = tx.hash();
        let size = tx.wire_size() as u64;
        self.entries
            .lock()
            .unwrap()
            .insert(hash, PoolEntry { tx, fee, size });
        hash
    }

    pub fn remove(&self, hash: &Hash) {
        self.entries.lock().unwrap().remove(hash);
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.lock().unwrap().contains_key(hash)
    }

    pub fn set_min_fee_per_k(&self, fee: u64) {
        self.min_fee_per_k.store(fee, Ordering::SeqCst);
    }
}

impl MempoolView for MockMempool {
    fn entries_by_ancestor_fee(&self) -> Vec<MempoolEntrySummary> {
        let mut summaries: Vec<MempoolEntrySummary> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(hash, entry)| MempoolEntrySummary {
                hash: *hash,
                size: entry.size,
                fee: entry.fee,
            })
            .collect();
        summaries.sort_by(|a, b| b.fee_per_k().cmp(&a.fee_per_k()).then(a.hash.cmp(&b.hash)));
        summaries
    }

    fn query_hashes(&self) -> Vec<Hash> {
        self.entries.lock().unwrap().keys().copied().collect()
    }

    fn get(&self, hash: &Hash) -> Option<TransactionRef> {
        self.entries.lock().unwrap().get(hash).map(|e| e.tx.clone())
    }

    fn tx_count(&self) -> u64 {
        self.entries.lock().unwrap().len() as u64
    }

    fn total_tx_bytes(&self) -> u64 {
        self.entries.lock().unwrap().values().map(|e| e.size).sum()
    }

    fn min_fee_per_k(&self) -> u64 {
        self.min_fee_per_k.load(Ordering::SeqCst)
    }
}

/// In-memory orphan pool.
#[derive(Default)]
pub struct MockOrphanPool {
    hashes: Mutex<Vec<Hash>>,
}

impl MockOrphanPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, hash: Hash) {
        self.hashes.lock().unwrap().push(hash);
    }
}

impl OrphanPoolView for MockOrphanPool {
    fn hashes(&self) -> Vec<Hash> {
        self.hashes.lock().unwrap().clone()
    }
}

/// Admission queue that records deliveries and optionally feeds them
/// straight back into a [`MockMempool`].
#[derive(Default)]
pub struct MockAdmission {
    deliveries: Mutex<Vec<(TransactionRef, PeerId)>>,
    target: Option<Arc<MockMempool>>,
}

impl MockAdmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admitted transactions land in `pool` immediately, fee'd at their
    /// own size (1000 per kilobyte).
    pub fn into_pool(pool: Arc<MockMempool>) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            target: Some(pool),
        }
    }

    pub fn deliveries(&self) -> Vec<(TransactionRef, PeerId)> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl AdmissionQueue for MockAdmission {
    fn enqueue(&self, tx: TransactionRef, from: PeerId) {
        if let Some(pool) = &self.target {
            let fee = tx.wire_size() as u64;
            pool.add_ref(tx.clone(), fee);
        }
        self.deliveries.lock().unwrap().push((tx, from));
    }
}

/// Misbehavior sink accumulating scores per peer.
#[derive(Default)]
pub struct RecordingMisbehavior {
    events: Mutex<Vec<(PeerId, u32)>>,
}

impl RecordingMisbehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(PeerId, u32)> {
        self.events.lock().unwrap().clone()
    }

    pub fn total_for(&self, peer: PeerId) -> u32 {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == peer)
            .map(|(_, score)| score)
            .sum()
    }
}

impl MisbehaviorSink for RecordingMisbehavior {
    fn misbehave(&self, peer: PeerId, score: u32) {
        self.events.lock().unwrap().push((peer, score));
    }
}

/// Hand-cranked monotonic clock.
#[derive(Default)]
pub struct ManualTime {
    micros: AtomicU64,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_micros(&self, delta: u64) {
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_micros(&self, value: u64) {
        self.micros.store(value, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

/// Deterministic randomness from a fixed seed.
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn random_u64(&self) -> u64 {
        self.rng.lock().unwrap().gen()
    }

    fn random_index(&self, n: usize) -> usize {
        self.rng.lock().unwrap().gen_range(0..n)
    }
}

/// Chain view pinned at a fixed height.
pub struct FixedChain {
    tip: AtomicI64,
}

impl FixedChain {
    pub fn at_height(tip: i64) -> Self {
        Self {
            tip: AtomicI64::new(tip),
        }
    }

    pub fn set_height(&self, tip: i64) {
        self.tip.store(tip, Ordering::SeqCst);
    }
}

impl ChainView for FixedChain {
    fn tip_height(&self) -> i64 {
        self.tip.load(Ordering::SeqCst)
    }
}

/// Peer handle that records outbound messages.
pub struct MockPeer {
    id: PeerId,
    supports: bool,
    min_version: u64,
    max_version: u64,
    best_height: i64,
    common_height: i64,
    sent: Mutex<Vec<SyncMessage>>,
}

impl MockPeer {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            supports: true,
            min_version: 0,
            max_version: 0,
            best_height: 0,
            common_height: 0,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_versions(mut self, min: u64, max: u64) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    pub fn with_heights(mut self, best: i64, common: i64) -> Self {
        self.best_height = best;
        self.common_height = common;
        self
    }

    pub fn without_capability(mut self) -> Self {
        self.supports = false;
        self
    }

    /// Drain everything sent so far.
    pub fn take_sent(&self) -> Vec<SyncMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl PeerLink for MockPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn log_name(&self) -> String {
        format!("{}", self.id)
    }

    fn supports_mempool_sync(&self) -> bool {
        self.supports
    }

    fn extended_version(&self, key: VersionKey) -> u64 {
        match key {
            VersionKey::MempoolSyncMinVersion => self.min_version,
            VersionKey::MempoolSyncMaxVersion => self.max_version,
        }
    }

    fn best_known_height(&self) -> i64 {
        self.best_height
    }

    fn common_height(&self) -> i64 {
        self.common_height
    }

    fn send(&self, message: SyncMessage) {
        self.sent.lock().unwrap().push(message);
    }
}

/// A service wired entirely to mocks, plus handles to each of them.
pub struct TestHarness {
    pub service: MempoolSyncService,
    pub mempool: Arc<MockMempool>,
    pub orphan_pool: Arc<MockOrphanPool>,
    pub admission: Arc<MockAdmission>,
    pub misbehavior: Arc<RecordingMisbehavior>,
    pub time: Arc<ManualTime>,
    pub chain: Arc<FixedChain>,
}

/// Harness with default configuration.
pub fn test_service() -> TestHarness {
    test_service_with_config(SyncConfig::default())
}

/// Harness with explicit configuration.
pub fn test_service_with_config(config: SyncConfig) -> TestHarness {
    let mempool = Arc::new(MockMempool::new());
    let orphan_pool = Arc::new(MockOrphanPool::new());
    let admission = Arc::new(MockAdmission::new());
    let misbehavior = Arc::new(RecordingMisbehavior::new());
    let time = Arc::new(ManualTime::new());
    let chain = Arc::new(FixedChain::at_height(0));
    let ports = SyncPorts {
        mempool: mempool.clone(),
        orphan_pool: orphan_pool.clone(),
        admission: admission.clone(),
        misbehavior: misbehavior.clone(),
        time: time.clone(),
        entropy: Arc::new(SeededEntropy::new(42)),
        chain: chain.clone(),
    };
    TestHarness {
        service: MempoolSyncService::new(config, ports),
        mempool,
        orphan_pool,
        admission,
        misbehavior,
        time,
        chain,
    }
}

/// Harness whose admission queue feeds a designated pool, for end-to-end
/// scenarios.
pub fn test_service_with_admitting_pool() -> TestHarness {
    let mempool = Arc::new(MockMempool::new());
    let orphan_pool = Arc::new(MockOrphanPool::new());
    let admission = Arc::new(MockAdmission::into_pool(mempool.clone()));
    let misbehavior = Arc::new(RecordingMisbehavior::new());
    let time = Arc::new(ManualTime::new());
    let chain = Arc::new(FixedChain::at_height(0));
    let ports = SyncPorts {
        mempool: mempool.clone(),
        orphan_pool: orphan_pool.clone(),
        admission: admission.clone(),
        misbehavior: misbehavior.clone(),
        time: time.clone(),
        entropy: Arc::new(SeededEntropy::new(7)),
        chain: chain.clone(),
    };
    TestHarness {
        service: MempoolSyncService::new(SyncConfig::default(), ports),
        mempool,
        orphan_pool,
        admission,
        misbehavior,
        time,
        chain,
    }
}
