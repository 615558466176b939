//! Protocol domain: configuration, messages, sessions, short ids and
//! version negotiation.

pub mod config;
pub mod messages;
pub mod registry;
pub mod short_id;
pub mod version;

pub use config::SyncConfig;
pub use messages::{
    Inv, InvType, MempoolSync, MempoolSyncInfo, MempoolSyncTx, RequestMempoolSyncTx,
};
pub use registry::{SyncRegistry, SyncSession};
pub use short_id::{derive_session_keys, short_id};
pub use version::negotiate_version;
