//! Subblock intake.

use shared_types::{short_hex, SubBlock};
use tracing::{debug, info};

use crate::domain::dag_set::SubblockDag;
use crate::error::DagError;

/// Announcement hook for subblocks accepted into the DAG; the host
/// relays them to its peers.
pub trait SubBlockRelay: Send + Sync {
    fn announce(&self, hash: shared_types::Hash);
}

/// No-op relay for hosts that do their own announcement scheduling.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentRelay;

impl SubBlockRelay for SilentRelay {
    fn announce(&self, _hash: shared_types::Hash) {}
}

/// Validate a freshly received subblock, insert it into the DAG and
/// announce it on success.
pub fn process_new_subblock(
    dag: &SubblockDag,
    relay: &dyn SubBlockRelay,
    subblock: SubBlock,
) -> Result<(), DagError> {
    crate::domain::validation::check_subblock_form(&subblock)?;
    let hash = subblock.hash();
    dag.insert(subblock)?;
    relay.announce(hash);
    info!(subblock = %short_hex(&hash), "accepted new subblock");
    Ok(())
}

/// Variant used while reprocessing stored subblocks; skips the relay.
pub fn process_stored_subblock(dag: &SubblockDag, subblock: SubBlock) -> Result<(), DagError> {
    crate::domain::validation::check_subblock_form(&subblock)?;
    let hash = subblock.hash();
    dag.insert(subblock)?;
    debug!(subblock = %short_hex(&hash), "reinserted stored subblock");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use shared_types::Hash;

    use super::*;
    use crate::domain::dag_set::{DagConfig, SubblockDag};
    use crate::domain::test_support::{malformed_subblock, subblock_with};
    use crate::error::SubBlockFormError;

    #[derive(Default)]
    struct RecordingRelay {
        announced: Mutex<Vec<Hash>>,
    }

    impl SubBlockRelay for RecordingRelay {
        fn announce(&self, hash: Hash) {
            self.announced.lock().unwrap().push(hash);
        }
    }

    #[test]
    fn test_accepted_subblock_is_announced() {
        let dag = SubblockDag::new(DagConfig { bobtail_k: 1 });
        let relay = RecordingRelay::default();
        let block = subblock_with(1, &[]);
        let hash = block.hash();
        process_new_subblock(&dag, &relay, block).expect("accepted");
        assert_eq!(relay.announced.lock().unwrap().as_slice(), &[hash]);
        assert!(dag.contains(&hash));
    }

    #[test]
    fn test_malformed_subblock_is_not_inserted() {
        let dag = SubblockDag::new(DagConfig { bobtail_k: 1 });
        let relay = RecordingRelay::default();
        let block = malformed_subblock();
        let result = process_new_subblock(&dag, &relay, block);
        assert!(matches!(
            result,
            Err(DagError::Malformed(SubBlockFormError::FirstNotProofBase))
        ));
        assert_eq!(dag.size(), 0);
        assert!(relay.announced.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_is_not_reannounced() {
        let dag = SubblockDag::new(DagConfig { bobtail_k: 1 });
        let relay = RecordingRelay::default();
        let block = subblock_with(1, &[]);
        process_new_subblock(&dag, &relay, block.clone()).expect("first");
        assert!(process_new_subblock(&dag, &relay, block).is_err());
        assert_eq!(relay.announced.lock().unwrap().len(), 1);
    }
}
