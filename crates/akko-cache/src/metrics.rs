//! Cache metrics, reported through the `metrics` facade.
//!
//! No recorder is installed here; without one every call is a no-op.

use metrics::counter;

use crate::error::{CacheOperation, TierKind};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_TIER_ERRORS_TOTAL: &str = "cache_tier_errors_total";
    pub const CACHE_LOADS_TOTAL: &str = "cache_loads_total";
}

/// Record a cache hit served by `tier`.
pub fn record_cache_hit(cache: &str, tier: TierKind) {
    counter!(names::CACHE_HITS_TOTAL, "cache" => cache.to_string(), "tier" => tier.as_str())
        .increment(1);
}

/// Record a miss in every tier.
pub fn record_cache_miss(cache: &str) {
    counter!(names::CACHE_MISSES_TOTAL, "cache" => cache.to_string()).increment(1);
}

/// Record a failed tier operation.
pub fn record_tier_error(cache: &str, tier: TierKind, operation: CacheOperation) {
    counter!(
        names::CACHE_TIER_ERRORS_TOTAL,
        "cache" => cache.to_string(),
        "tier" => tier.as_str(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

/// Record a loader invocation after a combined miss.
pub fn record_cache_load(cache: &str) {
    counter!(names::CACHE_LOADS_TOTAL, "cache" => cache.to_string()).increment(1);
}
