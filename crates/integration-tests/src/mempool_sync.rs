//! Two-peer mempool synchronization scenarios.

use std::sync::Arc;

use bobtail_sync::testing::{
    test_service_with_admitting_pool, test_service_with_config, MockPeer, TestHarness,
};
use bobtail_sync::ports::MempoolView;
use bobtail_sync::{PeerLink, SyncConfig, SyncMessage};
use shared_types::{PeerId, Transaction};

/// Drive one full exchange: deliver every message recorded on `a`'s link
/// to `b` and vice versa until both links go quiet. Returns the total
/// message count and how many `GET_MEMPOOLSYNCTX` rounds happened.
fn pump(
    a: &TestHarness,
    b: &TestHarness,
    link_to_b: &MockPeer,
    link_to_a: &MockPeer,
) -> (usize, usize) {
    let mut total = 0usize;
    let mut tx_requests = 0usize;
    loop {
        let from_a = link_to_b.take_sent();
        let from_b = link_to_a.take_sent();
        if from_a.is_empty() && from_b.is_empty() {
            break;
        }
        total += from_a.len() + from_b.len();
        for message in from_a {
            match message {
                SyncMessage::GetMempoolSync(inv, info) => {
                    b.service
                        .handle_sync_request(link_to_a, &inv, &info)
                        .expect("request handled");
                }
                SyncMessage::GetMempoolSyncTx(request) => {
                    tx_requests += 1;
                    b.service
                        .handle_sync_tx_request(link_to_a, &request)
                        .expect("tx request handled");
                }
                SyncMessage::MempoolSync(msg) => {
                    b.service
                        .handle_mempool_sync(link_to_a, &msg)
                        .expect("sync handled");
                }
                SyncMessage::MempoolSyncTx(msg) => {
                    b.service
                        .handle_sync_tx(link_to_a, &msg)
                        .expect("txs handled");
                }
            }
        }
        for message in from_b {
            match message {
                SyncMessage::GetMempoolSync(inv, info) => {
                    a.service
                        .handle_sync_request(link_to_b, &inv, &info)
                        .expect("request handled");
                }
                SyncMessage::GetMempoolSyncTx(request) => {
                    tx_requests += 1;
                    a.service
                        .handle_sync_tx_request(link_to_b, &request)
                        .expect("tx request handled");
                }
                SyncMessage::MempoolSync(msg) => {
                    a.service
                        .handle_mempool_sync(link_to_b, &msg)
                        .expect("sync handled");
                }
                SyncMessage::MempoolSyncTx(msg) => {
                    a.service
                        .handle_sync_tx(link_to_b, &msg)
                        .expect("txs handled");
                }
            }
        }
    }
    (total, tx_requests)
}

#[test]
fn test_disjoint_singletons_converge_in_four_messages() {
    let a = test_service_with_admitting_pool();
    let b = test_service_with_admitting_pool();

    let tx_a = Transaction::standard(vec![], vec![0xaa]);
    let tx_b = Transaction::standard(vec![], vec![0xbb]);
    let tx_a_hash = a.mempool.add(tx_a, 1_000);
    let tx_b_hash = b.mempool.add(tx_b, 1_000);

    // A talks to B through `link_to_b`; B answers through `link_to_a`.
    let link_to_b = MockPeer::new(PeerId(2));
    let link_to_a = MockPeer::new(PeerId(1));

    a.service.start_sync(&link_to_b).expect("start");
    let (total, tx_requests) = pump(&a, &b, &link_to_b, &link_to_a);

    assert_eq!(total, 4, "request, sketch, tx request, txs");
    assert_eq!(tx_requests, 1, "exactly one recovery round trip");
    assert!(a.mempool.contains(&tx_a_hash));
    assert!(
        a.mempool.contains(&tx_b_hash),
        "the peer's transaction must arrive"
    );
    assert!(
        a.service.registry().requested(PeerId(2)).unwrap().completed,
        "requester session closed"
    );
    assert!(
        b.service.registry().responded(PeerId(1)).unwrap().completed,
        "responder session closed after serving transactions"
    );
}

#[test]
fn test_identical_sets_need_only_two_messages() {
    let a = test_service_with_admitting_pool();
    let b = test_service_with_admitting_pool();

    for i in 0..100u8 {
        let tx = Transaction::standard(vec![], vec![i]);
        a.mempool.add(tx.clone(), 1_000);
        b.mempool.add(tx, 1_000);
    }

    let link_to_b = MockPeer::new(PeerId(2));
    let link_to_a = MockPeer::new(PeerId(1));
    a.service.start_sync(&link_to_b).expect("start");
    let (total, tx_requests) = pump(&a, &b, &link_to_b, &link_to_a);

    assert_eq!(total, 2, "only the request and the sketch");
    assert_eq!(tx_requests, 0, "no residual round trip");
    assert!(
        a.service.registry().requested(PeerId(2)).unwrap().completed,
        "requester completed without a recovery round"
    );
    assert_eq!(a.mempool.tx_count(), 100);
    assert_eq!(b.mempool.tx_count(), 100);
}

#[test]
fn test_rate_limited_repeat_request_is_banned_and_unanswered() {
    let responder = test_service_with_admitting_pool();
    responder
        .mempool
        .add(Transaction::standard(vec![], vec![1]), 500);

    let requester = test_service_with_admitting_pool();
    let link_to_responder = MockPeer::new(PeerId(2));
    let link_to_requester = MockPeer::new(PeerId(1));

    requester.service.start_sync(&link_to_responder).expect("start");
    let first = link_to_responder.take_sent();
    let SyncMessage::GetMempoolSync(inv, info) = &first[0] else {
        panic!("expected GetMempoolSync");
    };
    responder
        .service
        .handle_sync_request(&link_to_requester, inv, info)
        .expect("first request served");
    assert_eq!(link_to_requester.take_sent().len(), 1);

    // Ten seconds later the requester tries again.
    responder.time.advance_micros(10 * 1_000_000);
    let result = responder
        .service
        .handle_sync_request(&link_to_requester, inv, info);
    assert!(result.is_err(), "second request violates the rate limit");
    assert_eq!(
        responder.misbehavior.total_for(PeerId(1)),
        100,
        "ban-level score applied"
    );
    assert!(
        link_to_requester.take_sent().is_empty(),
        "no reply to the offending request"
    );
}

#[test]
fn test_version_mismatch_excludes_peer_entirely() {
    let config = SyncConfig {
        min_version_supported: 2,
        max_version_supported: 2,
        ..SyncConfig::default()
    };
    let a = test_service_with_config(config);
    let peer: Arc<dyn PeerLink> = Arc::new(MockPeer::new(PeerId(2)).with_versions(0, 1));

    let selected = a.service.select_sync_peer(std::slice::from_ref(&peer));
    assert!(selected.is_none(), "incompatible peer is not syncable");
    assert!(
        a.misbehavior.events().is_empty(),
        "version mismatch is not an offense"
    );
}

#[test]
fn test_lagging_peer_is_not_selected() {
    let a = test_service_with_admitting_pool();
    a.chain.set_height(100);
    let lagging: Arc<dyn PeerLink> =
        Arc::new(MockPeer::new(PeerId(2)).with_heights(80, 80));
    let current: Arc<dyn PeerLink> =
        Arc::new(MockPeer::new(PeerId(3)).with_heights(95, 95));

    let selected = a
        .service
        .select_sync_peer(&[lagging, current])
        .expect("one peer qualifies");
    assert_eq!(selected.id(), PeerId(3));
}
