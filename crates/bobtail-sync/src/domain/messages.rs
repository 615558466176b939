//! Protocol messages.
//!
//! Four messages drive a session: the requester opens with
//! `GET_MEMPOOLSYNC(inv, info)`, the responder answers with a graphene
//! sketch in `MEMPOOLSYNC`, and an optional `GET_MEMPOOLSYNCTX` /
//! `MEMPOOLSYNCTX` round trip recovers whatever the sketch could not.

use std::collections::BTreeSet;
use std::sync::Arc;

use bobtail_graphene::GrapheneSet;
use shared_types::{
    ByteReader, ByteWriter, Hash, Transaction, TransactionRef, WireDecode, WireEncode, WireError,
};

/// Upper sanity bound on a claimed sender transaction count.
pub const MAX_SENDER_TXS: u64 = 1 << 22;

/// Inventory object types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvType {
    Transaction,
    Block,
    SubBlock,
    MempoolSync,
}

impl InvType {
    fn to_wire(self) -> u32 {
        match self {
            InvType::Transaction => 1,
            InvType::Block => 2,
            InvType::SubBlock => 8,
            InvType::MempoolSync => 9,
        }
    }

    fn from_wire(value: u32) -> Result<Self, WireError> {
        match value {
            1 => Ok(InvType::Transaction),
            2 => Ok(InvType::Block),
            8 => Ok(InvType::SubBlock),
            9 => Ok(InvType::MempoolSync),
            other => Err(WireError::InvalidValue(format!("inv type {other}"))),
        }
    }
}

/// Inventory reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inv {
    pub inv_type: InvType,
    pub hash: Hash,
}

impl Inv {
    /// The inventory marker opening a mempool sync request.
    pub fn mempool_sync() -> Self {
        Self {
            inv_type: InvType::MempoolSync,
            hash: [0u8; 32],
        }
    }
}

impl WireEncode for Inv {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u32(self.inv_type.to_wire());
        w.put_raw(&self.hash);
    }
}

impl WireDecode for Inv {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            inv_type: InvType::from_wire(r.get_u32()?)?,
            hash: r.get_array()?,
        })
    }
}

/// Requester-side session parameters sent with `GET_MEMPOOLSYNC`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MempoolSyncInfo {
    /// Transactions the requester already holds (mempool + orphans +
    /// admission queue).
    pub n_tx_in_mempool: u64,
    /// Byte budget left in the requester's mempool.
    pub n_remaining_mempool_bytes: u64,
    /// First SipHash session key.
    pub shorttxid_k0: u64,
    /// Second SipHash session key.
    pub shorttxid_k1: u64,
    /// Fee-rate floor; cheaper transactions are not worth shipping.
    pub n_satoshi_per_k: u64,
}

impl WireEncode for MempoolSyncInfo {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u64(self.n_tx_in_mempool);
        w.put_u64(self.n_remaining_mempool_bytes);
        w.put_u64(self.shorttxid_k0);
        w.put_u64(self.shorttxid_k1);
        w.put_u64(self.n_satoshi_per_k);
    }
}

impl WireDecode for MempoolSyncInfo {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            n_tx_in_mempool: r.get_u64()?,
            n_remaining_mempool_bytes: r.get_u64()?,
            shorttxid_k0: r.get_u64()?,
            shorttxid_k1: r.get_u64()?,
            n_satoshi_per_k: r.get_u64()?,
        })
    }
}

/// Responder's sketch of its mempool.
#[derive(Clone, Debug, PartialEq)]
pub struct MempoolSync {
    /// Negotiated protocol version for this session.
    pub version: u64,
    /// How many transactions the sender sketched.
    pub n_sender_txs: u64,
    pub graphene_set: GrapheneSet,
}

impl WireEncode for MempoolSync {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_compact_size(self.version);
        w.put_u64(self.n_sender_txs);
        self.graphene_set.encode(w);
    }
}

impl WireDecode for MempoolSync {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let version = r.get_compact_size()?;
        let n_sender_txs = r.get_u64()?;
        if n_sender_txs > MAX_SENDER_TXS {
            return Err(WireError::InvalidValue(format!(
                "sender tx count {n_sender_txs} exceeds sanity bound"
            )));
        }
        let graphene_set = GrapheneSet::decode(r)
            .map_err(|e| WireError::InvalidValue(format!("graphene set: {e}")))?;
        Ok(Self {
            version,
            n_sender_txs,
            graphene_set,
        })
    }
}

/// Short ids the requester could not recover from the sketch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestMempoolSyncTx {
    pub cheap_hashes: BTreeSet<u64>,
}

impl WireEncode for RequestMempoolSyncTx {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_compact_size(self.cheap_hashes.len() as u64);
        for id in &self.cheap_hashes {
            w.put_u64(*id);
        }
    }
}

impl WireDecode for RequestMempoolSyncTx {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let count = r.get_compact_size()?;
        if count > r.remaining() as u64 / 8 {
            return Err(WireError::OversizedLength {
                declared: count,
                remaining: r.remaining(),
            });
        }
        let mut cheap_hashes = BTreeSet::new();
        for _ in 0..count {
            cheap_hashes.insert(r.get_u64()?);
        }
        Ok(Self { cheap_hashes })
    }
}

/// Transactions answering a `GET_MEMPOOLSYNCTX`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MempoolSyncTx {
    pub transactions: Vec<TransactionRef>,
}

impl WireEncode for MempoolSyncTx {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_compact_size(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode(w);
        }
    }
}

impl WireDecode for MempoolSyncTx {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
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
        Ok(Self { transactions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bobtail_graphene::GrapheneConfig;

    #[test]
    fn test_info_wire_layout_is_five_u64() {
        let info = MempoolSyncInfo {
            n_tx_in_mempool: 1,
            n_remaining_mempool_bytes: 2,
            shorttxid_k0: 3,
            shorttxid_k1: 4,
            n_satoshi_per_k: 5,
        };
        let bytes = info.to_wire_bytes();
        assert_eq!(bytes.len(), 40);
        assert_eq!(MempoolSyncInfo::from_wire_bytes(&bytes).unwrap(), info);
    }

    #[test]
    fn test_inv_round_trip_and_unknown_type() {
        let inv = Inv::mempool_sync();
        let bytes = inv.to_wire_bytes();
        assert_eq!(Inv::from_wire_bytes(&bytes).unwrap(), inv);

        let mut bad = bytes.clone();
        bad[3] = 0xff;
        assert!(Inv::from_wire_bytes(&bad).is_err());
    }

    #[test]
    fn test_mempool_sync_round_trip() {
        let ids = vec![1u64, 2, 3];
        let msg = MempoolSync {
            version: 0,
            n_sender_txs: 3,
            graphene_set: GrapheneSet::build(&ids, 3, &GrapheneConfig::default()).unwrap(),
        };
        let bytes = msg.to_wire_bytes();
        assert_eq!(MempoolSync::from_wire_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_mempool_sync_rejects_excessive_tx_count() {
        let ids = vec![1u64];
        let mut msg = MempoolSync {
            version: 0,
            n_sender_txs: 1,
            graphene_set: GrapheneSet::build(&ids, 1, &GrapheneConfig::default()).unwrap(),
        };
        msg.n_sender_txs = MAX_SENDER_TXS + 1;
        assert!(MempoolSync::from_wire_bytes(&msg.to_wire_bytes()).is_err());
    }

    #[test]
    fn test_request_round_trip() {
        let req = RequestMempoolSyncTx {
            cheap_hashes: [9u64, 4, 7].into_iter().collect(),
        };
        let bytes = req.to_wire_bytes();
        assert_eq!(RequestMempoolSyncTx::from_wire_bytes(&bytes).unwrap(), req);
    }

    #[test]
    fn test_sync_tx_round_trip() {
        let msg = MempoolSyncTx {
            transactions: vec![
                Arc::new(Transaction::standard(vec![], vec![1, 2, 3])),
                Arc::new(Transaction::standard(vec![], vec![4])),
            ],
        };
        let bytes = msg.to_wire_bytes();
        let decoded = MempoolSyncTx::from_wire_bytes(&bytes).unwrap();
        assert_eq!(decoded.transactions.len(), 2);
        assert_eq!(
            decoded.transactions[0].hash(),
            msg.transactions[0].hash()
        );
    }
}
