//! Requester side of the exchange.
//!
//! Idle → send `GET_MEMPOOLSYNC` → await the sketch → either finish
//! (no residuals) or fetch the missing transactions and finish when they
//! arrive.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::domain::messages::{Inv, MempoolSync, MempoolSyncTx, RequestMempoolSyncTx};
use crate::domain::registry::SyncSession;
use crate::error::{SyncError, ViolationKind};
use crate::ports::outbound::{PeerLink, SyncMessage};
use crate::service::MempoolSyncService;

impl MempoolSyncService {
    /// Open a synchronization round with `peer`.
    ///
    /// Fails with [`SyncError::NegotiationFailure`] when no common
    /// version exists; the peer is skipped, not penalized.
    pub fn start_sync(&self, peer: &dyn PeerLink) -> Result<(), SyncError> {
        self.negotiate_with(peer)?;
        let info = self.build_sync_info();
        self.registry().record_requested(
            peer.id(),
            SyncSession::open(
                self.ports().time.now_micros(),
                info.shorttxid_k0,
                info.shorttxid_k1,
            ),
        );
        peer.send(SyncMessage::GetMempoolSync(Inv::mempool_sync(), info));
        info!(peer = %peer.log_name(), txs = info.n_tx_in_mempool, "requested mempool sync");
        Ok(())
    }

    /// Handle the responder's sketch.
    pub fn handle_mempool_sync(
        &self,
        peer: &dyn PeerLink,
        message: &MempoolSync,
    ) -> Result<(), SyncError> {
        debug!(peer = %peer.log_name(), "received mempool sync");
        let session = match self.registry().requested(peer.id()) {
            None => return Err(self.violation(peer.id(), ViolationKind::Unrequested)),
            Some(session) if session.completed => {
                return Err(self.violation(peer.id(), ViolationKind::StaleSession))
            }
            Some(session) => session,
        };

        let candidate_map = self.pool_short_ids(session.k0, session.k1);
        let candidate_ids: BTreeSet<u64> = candidate_map.keys().copied().collect();

        let missing: BTreeSet<u64> = match message.graphene_set.reconcile(&candidate_ids) {
            Ok(reconciled) => reconciled
                .sender_short_ids
                .into_iter()
                .filter(|id| !candidate_map.contains_key(id))
                .collect(),
            Err(e) => {
                // Undecodable sketch: give up on recovery for this round
                // rather than penalizing the peer.
                warn!(peer = %peer.log_name(), error = %e, "graphene set could not be reconciled");
                BTreeSet::new()
            }
        };

        info!(
            peer = %peer.log_name(),
            sender_txs = message.n_sender_txs,
            missing = missing.len(),
            "mempool sync received"
        );

        if !missing.is_empty() {
            let count = missing.len();
            peer.send(SyncMessage::GetMempoolSyncTx(RequestMempoolSyncTx {
                cheap_hashes: missing,
            }));
            debug!(peer = %peer.log_name(), count, "requested missing transactions");
            return Ok(());
        }

        self.registry().complete_requested(peer.id());
        debug!(peer = %peer.log_name(), "completing mempool sync; nothing missing");
        Ok(())
    }

    /// Handle the recovered transactions closing the round.
    pub fn handle_sync_tx(
        &self,
        peer: &dyn PeerLink,
        message: &MempoolSyncTx,
    ) -> Result<(), SyncError> {
        match self.registry().requested(peer.id()) {
            None => return Err(self.violation(peer.id(), ViolationKind::Unrequested)),
            Some(session) if session.completed => {
                return Err(self.violation(peer.id(), ViolationKind::StaleSession))
            }
            Some(_) => {}
        }

        debug!(
            peer = %peer.log_name(),
            count = message.transactions.len(),
            "received mempool sync transactions"
        );
        for tx in &message.transactions {
            self.ports().admission.enqueue(tx.clone(), peer.id());
        }
        self.registry().complete_requested(peer.id());
        info!(
            peer = %peer.log_name(),
            count = message.transactions.len(),
            "recovered transactions via mempool sync"
        );
        Ok(())
    }
}
