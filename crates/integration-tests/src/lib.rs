//! End-to-end scenarios.
//!
//! Two [`bobtail_sync::MempoolSyncService`]s are wired back to back by
//! hand-delivering each recorded message to the opposite side, which
//! exercises the full four-message exchange without any transport. The
//! DAG and proof-of-work scenarios run against the real structures.

#[cfg(test)]
mod dag_and_pow;
#[cfg(test)]
mod mempool_sync;
