//! Responder side of the exchange.

use bobtail_graphene::GrapheneSet;
use tracing::{debug, info};

use crate::domain::config::{MEMPOOLSYNC_FREQ_GRACE_US, MEMPOOLSYNC_FREQ_US};
use crate::domain::messages::{
    Inv, InvType, MempoolSync, MempoolSyncInfo, MempoolSyncTx, RequestMempoolSyncTx,
};
use crate::domain::registry::SyncSession;
use crate::domain::short_id::short_id;
use crate::error::{SyncError, ViolationKind};
use crate::ports::outbound::{PeerLink, SyncMessage};
use crate::service::MempoolSyncService;

impl MempoolSyncService {
    /// Handle an incoming `GET_MEMPOOLSYNC`.
    ///
    /// Selects our highest-fee-rate transactions until the requester's
    /// byte budget runs out, sketches them under the requester's session
    /// keys and replies with `MEMPOOLSYNC`. An empty pool ends the round
    /// silently.
    pub fn handle_sync_request(
        &self,
        peer: &dyn PeerLink,
        inv: &Inv,
        info: &MempoolSyncInfo,
    ) -> Result<(), SyncError> {
        debug!(peer = %peer.log_name(), "handling mempool sync request");

        if inv.inv_type != InvType::MempoolSync {
            return Err(self.violation(peer.id(), ViolationKind::WrongInventoryType));
        }
        if !self.config().sync_mempool_with_peers {
            return Err(self.violation(peer.id(), ViolationKind::CapabilityDisabled));
        }

        let now = self.ports().time.now_micros();
        let opened = self.registry().try_begin_responded(
            peer.id(),
            SyncSession::open(now, info.shorttxid_k0, info.shorttxid_k1),
            MEMPOOLSYNC_FREQ_US - MEMPOOLSYNC_FREQ_GRACE_US,
        );
        if !opened {
            return Err(self.violation(peer.id(), ViolationKind::RateLimited));
        }

        // Walk the pool in decreasing ancestor-fee order until the
        // requester's byte budget is spent.
        let mut candidates = Vec::new();
        let mut remaining = info.n_remaining_mempool_bytes as i64;
        for entry in self.ports().mempool.entries_by_ancestor_fee() {
            if remaining <= 0 {
                break;
            }
            if entry.fee_per_k() < info.n_satoshi_per_k {
                continue;
            }
            candidates.push(entry.hash);
            remaining -= entry.size as i64;
        }
        // Orphans ride along; their fee rate and true cost are unknown
        // until their parents arrive.
        candidates.extend(self.ports().orphan_pool.hashes());

        if candidates.is_empty() {
            debug!(peer = %peer.log_name(), "pool is empty; aborting mempool sync");
            return Ok(());
        }

        let version = self.negotiate_with(peer)?;
        let sender_ids: Vec<u64> = candidates
            .iter()
            .map(|hash| short_id(info.shorttxid_k0, info.shorttxid_k1, hash))
            .collect();
        let graphene_set = GrapheneSet::build(
            &sender_ids,
            info.n_tx_in_mempool,
            &self.config().graphene,
        )
        .map_err(SyncError::Reconcile)?;

        let n_sender_txs = sender_ids.len() as u64;
        peer.send(SyncMessage::MempoolSync(MempoolSync {
            version,
            n_sender_txs,
            graphene_set,
        }));
        info!(
            peer = %peer.log_name(),
            version,
            txs = n_sender_txs,
            "sent mempool sync"
        );
        Ok(())
    }

    /// Handle a `GET_MEMPOOLSYNCTX` for transactions the sketch did not
    /// cover.
    ///
    /// Short ids are recomputed over the current pool; a transaction that
    /// left the pool mid-session is simply absent from the reply.
    pub fn handle_sync_tx_request(
        &self,
        peer: &dyn PeerLink,
        request: &RequestMempoolSyncTx,
    ) -> Result<(), SyncError> {
        if request.cheap_hashes.is_empty() {
            return Err(self.violation(peer.id(), ViolationKind::MalformedRequest));
        }
        let session = match self.registry().responded(peer.id()) {
            None => return Err(self.violation(peer.id(), ViolationKind::Unrequested)),
            Some(session) if session.completed => {
                return Err(self.violation(peer.id(), ViolationKind::StaleSession))
            }
            Some(session) => session,
        };

        debug!(
            peer = %peer.log_name(),
            requested = request.cheap_hashes.len(),
            "received mempool sync tx request"
        );

        let mut transactions = Vec::new();
        for hash in self.pool_hashes() {
            let id = short_id(session.k0, session.k1, &hash);
            if !request.cheap_hashes.contains(&id) {
                continue;
            }
            if let Some(tx) = self.ports().mempool.get(&hash) {
                transactions.push(tx);
            }
        }

        info!(
            peer = %peer.log_name(),
            count = transactions.len(),
            "sending mempool sync transactions"
        );
        peer.send(SyncMessage::MempoolSyncTx(MempoolSyncTx { transactions }));
        // No further messages belong to this round.
        self.registry().complete_responded(peer.id());
        Ok(())
    }
}
