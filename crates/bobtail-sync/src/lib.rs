//! # Mempool Synchronization
//!
//! Graphene-based reconciliation of two peers' pending-transaction sets.
//!
//! A round is at most four messages: the requester describes its pool and
//! session keys in `GET_MEMPOOLSYNC`; the responder sketches its own pool
//! into a [`bobtail_graphene::GrapheneSet`] and answers `MEMPOOLSYNC`;
//! ids the requester cannot reconstruct come back over one
//! `GET_MEMPOOLSYNCTX` / `MEMPOOLSYNCTX` round trip. Neither side ever
//! enumerates its full set on the wire.
//!
//! ## Architecture
//!
//! - **Domain** (`domain/`): message types, per-peer session registry,
//!   short-id construction, version negotiation, configuration.
//! - **Ports** (`ports/`): traits for everything the host supplies —
//!   pools, admission, peer messaging, chain heights, misbehavior
//!   scoring, time, randomness.
//! - **Service** (`service/`): [`MempoolSyncService`], the requester and
//!   responder state machines.
//! - **Testing** (`testing`): mock ports shared with the integration
//!   tests.
//!
//! ## Misbehavior
//!
//! Handlers report scores through the misbehavior sink before returning
//! an error: 10 for unrequested responses, 100 for rate-limit breaches,
//! malformed or duplicate traffic. Version mismatches are skipped, never
//! punished.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod testing;

pub use domain::{
    negotiate_version, Inv, InvType, MempoolSync, MempoolSyncInfo, MempoolSyncTx,
    RequestMempoolSyncTx, SyncConfig, SyncRegistry, SyncSession,
};
pub use error::{SyncError, ViolationKind};
pub use ports::{PeerLink, SyncMessage};
pub use service::{MempoolSyncService, SyncPorts};
