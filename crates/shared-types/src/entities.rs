//! # Core Domain Entities
//!
//! The shared vocabulary of the relay: transaction identifiers, outpoints,
//! transactions, subblocks and peer identity.
//!
//! Transactions here are deliberately minimal. Pool admission, script
//! validation and fee computation belong to the host node; the relay only
//! needs a transaction's identity, its spent outpoints and whether it is a
//! proofbase or a coinbase.

use std::fmt;
use std::sync::Arc;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::wire::{ByteReader, ByteWriter, WireDecode, WireEncode, WireError};

/// A 32-byte transaction or subblock id.
pub type Hash = [u8; 32];

/// Hex rendering of the leading bytes of a hash, for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hash[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Stable opaque identifier the host assigns to a connected peer.
///
/// Entries keyed by a `PeerId` must be dropped by the host when the peer
/// disconnects; the relay never fabricates ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

/// A reference to a transaction output: the creating transaction plus the
/// output index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl WireEncode for OutPoint {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_raw(&self.txid);
        w.put_u32(self.vout);
    }
}

impl WireDecode for OutPoint {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            txid: r.get_array()?,
            vout: r.get_u32()?,
        })
    }
}

/// Transaction role marker.
///
/// A proofbase is the mandatory first transaction of a subblock; it mirrors
/// a coinbase structurally but is never redeemable as one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Standard,
    ProofBase,
    CoinBase,
}

impl TxKind {
    fn to_wire(self) -> u8 {
        match self {
            TxKind::Standard => 0,
            TxKind::ProofBase => 1,
            TxKind::CoinBase => 2,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, WireError> {
        match byte {
            0 => Ok(TxKind::Standard),
            1 => Ok(TxKind::ProofBase),
            2 => Ok(TxKind::CoinBase),
            other => Err(WireError::InvalidValue(format!("tx kind {other}"))),
        }
    }
}

/// A transaction input. Only the spent outpoint matters to the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prevout: OutPoint,
}

impl WireEncode for TxInput {
    fn encode(&self, w: &mut ByteWriter) {
        self.prevout.encode(w);
    }
}

impl WireDecode for TxInput {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            prevout: OutPoint::decode(r)?,
        })
    }
}

/// A relay-visible transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u16,
    pub kind: TxKind,
    pub inputs: Vec<TxInput>,
    /// Opaque remainder of the transaction (outputs, witnesses, scripts).
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn standard(inputs: Vec<TxInput>, payload: Vec<u8>) -> Self {
        Self {
            version: 1,
            kind: TxKind::Standard,
            inputs,
            payload,
        }
    }

    pub fn proof_base(payload: Vec<u8>) -> Self {
        Self {
            version: 1,
            kind: TxKind::ProofBase,
            inputs: Vec::new(),
            payload,
        }
    }

    pub fn coin_base(payload: Vec<u8>) -> Self {
        Self {
            version: 1,
            kind: TxKind::CoinBase,
            inputs: Vec::new(),
            payload,
        }
    }

    pub fn is_proof_base(&self) -> bool {
        self.kind == TxKind::ProofBase
    }

    pub fn is_coin_base(&self) -> bool {
        self.kind == TxKind::CoinBase
    }

    /// Transaction id: SHA-256 over the wire encoding.
    pub fn hash(&self) -> Hash {
        sha256(&self.to_wire_bytes())
    }

    /// Serialized size in bytes, used for pool byte budgeting.
    pub fn wire_size(&self) -> usize {
        self.to_wire_bytes().len()
    }
}

impl WireEncode for Transaction {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u16(self.version);
        w.put_u8(self.kind.to_wire());
        w.put_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(w);
        }
        w.put_byte_vec(&self.payload);
    }
}

impl WireDecode for Transaction {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let version = r.get_u16()?;
        let kind = TxKind::from_wire(r.get_u8()?)?;
        let count = r.get_compact_size()?;
        if count > r.remaining() as u64 {
            return Err(WireError::OversizedLength {
                declared: count,
                remaining: r.remaining(),
            });
        }
        let mut inputs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            inputs.push(TxInput::decode(r)?);
        }
        let payload = r.get_byte_vec()?;
        Ok(Self {
            version,
            kind,
            inputs,
            payload,
        })
    }
}

/// Shared handle to an immutable transaction.
pub type TransactionRef = Arc<Transaction>;

/// Header of a subblock: a weak proof of work anchored to the main chain,
/// carrying the hashes of the subblocks it builds on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubBlockHeader {
    pub version: u32,
    /// Main-chain block this subblock extends.
    pub prev_block: Hash,
    pub merkle_root: Hash,
    pub timestamp: u64,
    /// Weak proof-of-work target.
    pub target: U256,
    pub nonce: u64,
    /// Hashes of ancestor subblocks in the relay graph.
    pub ancestor_hashes: Vec<Hash>,
}

impl SubBlockHeader {
    pub fn hash(&self) -> Hash {
        sha256(&self.to_wire_bytes())
    }
}

impl WireEncode for SubBlockHeader {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u32(self.version);
        w.put_raw(&self.prev_block);
        w.put_raw(&self.merkle_root);
        w.put_u64(self.timestamp);
        let mut target = [0u8; 32];
        self.target.to_big_endian(&mut target);
        w.put_raw(&target);
        w.put_u64(self.nonce);
        w.put_compact_size(self.ancestor_hashes.len() as u64);
        for ancestor in &self.ancestor_hashes {
            w.put_raw(ancestor);
        }
    }
}

impl WireDecode for SubBlockHeader {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let version = r.get_u32()?;
        let prev_block = r.get_array()?;
        let merkle_root = r.get_array()?;
        let timestamp = r.get_u64()?;
        let target = U256::from_big_endian(&r.get_array::<32>()?);
        let nonce = r.get_u64()?;
        let count = r.get_compact_size()?;
        if count > r.remaining() as u64 / 32 {
            return Err(WireError::OversizedLength {
                declared: count,
                remaining: r.remaining(),
            });
        }
        let mut ancestor_hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ancestor_hashes.push(r.get_array()?);
        }
        Ok(Self {
            version,
            prev_block,
            merkle_root,
            timestamp,
            target,
            nonce,
            ancestor_hashes,
        })
    }
}

/// A block-shaped structure under a weak proof-of-work target. Its first
/// transaction is a proofbase.
#[derive(Clone, Debug)]
pub struct SubBlock {
    pub header: SubBlockHeader,
    pub transactions: Vec<TransactionRef>,
}

impl SubBlock {
    /// Subblock id: the header hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn ancestor_hashes(&self) -> &[Hash] {
        &self.header.ancestor_hashes
    }
}

impl WireEncode for SubBlock {
    fn encode(&self, w: &mut ByteWriter) {
        self.header.encode(w);
        w.put_compact_size(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode(w);
        }
    }
}

impl WireDecode for SubBlock {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let header = SubBlockHeader::decode(r)?;
        let count = r.get_compact_size()?;
        if count > r.remaining() as u64 {
            return Err(WireError::OversizedLength {
                declared: count,
                remaining: r.remaining(),
            });
        }
        let mut transactions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            transactions.push(Arc::new(Transaction::decode(r)?));
        }
        Ok(Self {
            header,
            transactions,
        })
    }
}

fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::standard(
            vec![TxInput {
                prevout: OutPoint::new([7u8; 32], 2),
            }],
            vec![0xde, 0xad],
        )
    }

    #[test]
    fn test_transaction_wire_round_trip() {
        let tx = sample_tx();
        let bytes = tx.to_wire_bytes();
        let decoded = Transaction::from_wire_bytes(&bytes).expect("decode");
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash(), "id must survive the codec");
    }

    #[test]
    fn test_transaction_hash_depends_on_inputs() {
        let a = sample_tx();
        let mut b = a.clone();
        b.inputs[0].prevout.vout = 3;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_proof_base_and_coin_base_markers() {
        assert!(Transaction::proof_base(vec![1]).is_proof_base());
        assert!(!Transaction::proof_base(vec![1]).is_coin_base());
        assert!(Transaction::coin_base(vec![1]).is_coin_base());
        assert!(!sample_tx().is_proof_base());
    }

    #[test]
    fn test_tx_kind_rejects_unknown_byte() {
        let mut bytes = sample_tx().to_wire_bytes();
        bytes[2] = 9; // kind byte follows the u16 version
        assert!(matches!(
            Transaction::from_wire_bytes(&bytes),
            Err(WireError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_subblock_wire_round_trip() {
        let subblock = SubBlock {
            header: SubBlockHeader {
                version: 1,
                prev_block: [1u8; 32],
                merkle_root: [2u8; 32],
                timestamp: 1_700_000_000,
                target: U256::from(1_000_000u64),
                nonce: 42,
                ancestor_hashes: vec![[3u8; 32], [4u8; 32]],
            },
            transactions: vec![
                Arc::new(Transaction::proof_base(vec![9])),
                Arc::new(sample_tx()),
            ],
        };
        let bytes = subblock.to_wire_bytes();
        let decoded = SubBlock::from_wire_bytes(&bytes).expect("decode");
        assert_eq!(decoded.hash(), subblock.hash());
        assert_eq!(decoded.ancestor_hashes(), subblock.ancestor_hashes());
        assert_eq!(decoded.transactions.len(), 2);
    }

    #[test]
    fn test_subblock_hash_covers_ancestors() {
        let mut header = SubBlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 0,
            target: U256::one(),
            nonce: 0,
            ancestor_hashes: vec![],
        };
        let bare = header.hash();
        header.ancestor_hashes.push([5u8; 32]);
        assert_ne!(bare, header.hash(), "ancestor set is part of the id");
    }
}
