//! Trait boundary between the synchronization core and the host node.

pub mod outbound;

pub use outbound::{
    AdmissionQueue, ChainView, EntropySource, MempoolEntrySummary, MempoolView, MisbehaviorSink,
    OrphanPoolView, OsEntropySource, PeerLink, SyncMessage, SystemTimeSource, TimeSource,
    VersionKey,
};
