//! Proof-of-work domain logic.

pub mod kos;

pub use kos::{
    best_k, check_bobtail_pow, check_bobtail_pow_from_ordered, check_subblock_pow,
    is_below_kos_threshold, is_below_kos_threshold_scaled, kos_threshold,
    DEFAULT_KOS_SCALE_FACTOR, KOS_INCLUSION_PROB,
};
