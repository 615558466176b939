//! DAG merging and proof-of-work scenarios.

use std::sync::Arc;

use bobtail_dag::{DagConfig, SubblockDag};
use bobtail_pow::{check_subblock_pow, is_below_kos_threshold};
use primitive_types::U256;
use shared_types::{Hash, SubBlock, SubBlockHeader, Transaction};

fn subblock(tag: u8, ancestors: &[Hash]) -> SubBlock {
    SubBlock {
        header: SubBlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root: [tag; 32],
            timestamp: 0,
            target: U256::from(1_000_000u64),
            nonce: 0,
            ancestor_hashes: ancestors.to_vec(),
        },
        transactions: vec![Arc::new(Transaction::proof_base(vec![tag]))],
    }
}

#[test]
fn test_bridging_subblock_merges_components() {
    let dag = SubblockDag::new(DagConfig { bobtail_k: 1 });

    let n1 = subblock(1, &[]);
    let n2 = subblock(2, &[]);
    let (n1_hash, n2_hash) = (n1.hash(), n2.hash());
    dag.insert(n1).expect("n1");
    dag.insert(n2).expect("n2");
    assert_eq!(dag.component_count(), 2);
    assert_eq!(dag.component_of(&n1_hash), Some(0));
    assert_eq!(dag.component_of(&n2_hash), Some(1));

    let n3 = subblock(3, &[n1_hash, n2_hash]);
    let n3_hash = n3.hash();
    dag.insert(n3).expect("n3");

    assert_eq!(dag.component_count(), 1, "one merged component remains");
    for hash in [&n1_hash, &n2_hash, &n3_hash] {
        assert_eq!(
            dag.component_of(hash),
            Some(0),
            "every node lands in component 0"
        );
    }
    assert_eq!(dag.size(), 3, "the merge preserved all nodes");
    assert_eq!(dag.tips(), vec![n3_hash], "the bridge is the only tip");
}

#[test]
fn test_kos_acceptance_boundary() {
    let k = 3u8;
    let target = U256::from(1_000_000u64);
    assert!(is_below_kos_threshold(U256::from(300_000u64), target, k));
    assert!(!is_below_kos_threshold(U256::from(30_000_000u64), target, k));
}

#[test]
fn test_subblock_header_hash_judged_against_weak_target() {
    let k = 3u8;
    // A hash with many leading zero bytes is tiny as an integer and
    // passes even a modest target; an all-ones hash cannot.
    let mut low = [0u8; 32];
    low[31] = 1;
    let high = [0xffu8; 32];
    let target = U256::from(1_000_000u64);
    assert!(check_subblock_pow(&low, target, k));
    assert!(!check_subblock_pow(&high, target, k));
}
