//! Subblock structural checks.

use shared_types::SubBlock;

use crate::error::SubBlockFormError;

/// Check the transaction-shape rules every subblock must satisfy: at
/// least one transaction, the first one a proofbase, no other proofbase,
/// and no coinbase anywhere.
pub fn check_subblock_form(subblock: &SubBlock) -> Result<(), SubBlockFormError> {
    let Some(first) = subblock.transactions.first() else {
        return Err(SubBlockFormError::Empty);
    };
    if !first.is_proof_base() {
        return Err(SubBlockFormError::FirstNotProofBase);
    }
    for tx in &subblock.transactions[1..] {
        if tx.is_proof_base() {
            return Err(SubBlockFormError::ExtraProofBase);
        }
    }
    if subblock.transactions.iter().any(|tx| tx.is_coin_base()) {
        return Err(SubBlockFormError::ContainsCoinBase);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use primitive_types::U256;
    use shared_types::{SubBlock, SubBlockHeader, Transaction};

    use super::*;

    fn header() -> SubBlockHeader {
        SubBlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 0,
            target: U256::one(),
            nonce: 0,
            ancestor_hashes: vec![],
        }
    }

    fn subblock(transactions: Vec<Transaction>) -> SubBlock {
        SubBlock {
            header: header(),
            transactions: transactions.into_iter().map(Arc::new).collect(),
        }
    }

    #[test]
    fn test_valid_subblock_passes() {
        let block = subblock(vec![
            Transaction::proof_base(vec![1]),
            Transaction::standard(vec![], vec![2]),
        ]);
        assert_eq!(check_subblock_form(&block), Ok(()));
    }

    #[test]
    fn test_empty_subblock_fails() {
        assert_eq!(
            check_subblock_form(&subblock(vec![])),
            Err(SubBlockFormError::Empty)
        );
    }

    #[test]
    fn test_first_must_be_proofbase() {
        let block = subblock(vec![Transaction::standard(vec![], vec![1])]);
        assert_eq!(
            check_subblock_form(&block),
            Err(SubBlockFormError::FirstNotProofBase)
        );
    }

    #[test]
    fn test_second_proofbase_fails() {
        let block = subblock(vec![
            Transaction::proof_base(vec![1]),
            Transaction::proof_base(vec![2]),
        ]);
        assert_eq!(
            check_subblock_form(&block),
            Err(SubBlockFormError::ExtraProofBase)
        );
    }

    #[test]
    fn test_coinbase_anywhere_fails() {
        let block = subblock(vec![
            Transaction::proof_base(vec![1]),
            Transaction::coin_base(vec![2]),
        ]);
        assert_eq!(
            check_subblock_form(&block),
            Err(SubBlockFormError::ContainsCoinBase)
        );
    }
}
