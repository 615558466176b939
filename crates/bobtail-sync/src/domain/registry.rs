//! Per-peer session bookkeeping.
//!
//! Two maps, one per direction: sessions we opened (`requested`) and
//! sessions a peer opened with us (`responded`). One mutex guards both;
//! every handler touches the registry only inside short critical
//! sections, with all network I/O outside.

use std::collections::HashMap;

use parking_lot::Mutex;
use shared_types::PeerId;

/// State of one synchronization round with one peer, in one direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncSession {
    /// Monotonic timestamp of the last state change, in microseconds.
    pub last_updated_us: u64,
    /// First SipHash session key.
    pub k0: u64,
    /// Second SipHash session key.
    pub k1: u64,
    /// Once true, further messages for this round are misbehavior.
    pub completed: bool,
}

impl SyncSession {
    pub fn open(now_us: u64, k0: u64, k1: u64) -> Self {
        Self {
            last_updated_us: now_us,
            k0,
            k1,
            completed: false,
        }
    }
}

#[derive(Default)]
struct SessionMaps {
    requested: HashMap<PeerId, SyncSession>,
    responded: HashMap<PeerId, SyncSession>,
}

/// Registry of in-flight synchronization sessions, both directions.
///
/// Owned by the networking layer; entries for a peer must be removed when
/// that peer disconnects.
#[derive(Default)]
pub struct SyncRegistry {
    inner: Mutex<SessionMaps>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the session we initiated toward `peer`.
    pub fn record_requested(&self, peer: PeerId, session: SyncSession) {
        self.inner.lock().requested.insert(peer, session);
    }

    /// Record (or replace) the session `peer` initiated toward us.
    pub fn record_responded(&self, peer: PeerId, session: SyncSession) {
        self.inner.lock().responded.insert(peer, session);
    }

    pub fn requested(&self, peer: PeerId) -> Option<SyncSession> {
        self.inner.lock().requested.get(&peer).copied()
    }

    pub fn responded(&self, peer: PeerId) -> Option<SyncSession> {
        self.inner.lock().responded.get(&peer).copied()
    }

    /// Mark the requester-side session complete. Returns false when no
    /// session exists.
    pub fn complete_requested(&self, peer: PeerId) -> bool {
        match self.inner.lock().requested.get_mut(&peer) {
            Some(session) => {
                session.completed = true;
                true
            }
            None => false,
        }
    }

    /// Mark the responder-side session complete. Returns false when no
    /// session exists.
    pub fn complete_responded(&self, peer: PeerId) -> bool {
        match self.inner.lock().responded.get_mut(&peer) {
            Some(session) => {
                session.completed = true;
                true
            }
            None => false,
        }
    }

    /// Open a responder-side session unless the peer's previous request
    /// is still inside the rate-limit window. Check and insert happen
    /// under one lock so concurrent requests cannot slip through.
    pub fn try_begin_responded(
        &self,
        peer: PeerId,
        session: SyncSession,
        min_interval_us: u64,
    ) -> bool {
        let mut maps = self.inner.lock();
        if let Some(prev) = maps.responded.get(&peer) {
            if session.last_updated_us.saturating_sub(prev.last_updated_us) < min_interval_us {
                return false;
            }
        }
        maps.responded.insert(peer, session);
        true
    }

    /// Drop all state for a disconnected peer.
    pub fn remove_peer(&self, peer: PeerId) {
        let mut maps = self.inner.lock();
        maps.requested.remove(&peer);
        maps.responded.remove(&peer);
    }

    pub fn clear(&self) {
        let mut maps = self.inner.lock();
        maps.requested.clear();
        maps.responded.clear();
    }
}
