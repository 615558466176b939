//! # k-Order-Statistic Proof of Work
//!
//! Statistical proof-of-work rules for subblocks and bobtail blocks.
//!
//! A single subblock hash is judged against the CDF of a gamma
//! distribution with shape `k` and scale equal to the weak target: it is
//! admissible while the CDF value stays at or below the inclusion
//! probability. A bobtail block collecting `k` subblocks is admissible
//! when the average of its numerically smallest subblock hashes falls
//! below the target. [`best_k`] searches for the largest `k` a desired
//! subblock population supports at a given confidence.

pub mod domain;

pub use domain::{
    best_k, check_bobtail_pow, check_bobtail_pow_from_ordered, check_subblock_pow,
    is_below_kos_threshold, is_below_kos_threshold_scaled, kos_threshold,
    DEFAULT_KOS_SCALE_FACTOR, KOS_INCLUSION_PROB,
};
