//! Prometheus metrics for cache effectiveness.

use metrics::{counter, describe_counter};

/// Metric names for the cache layer.
pub mod names {
    /// Lookups answered from the store.
    pub const CACHE_HITS_TOTAL: &str = "memora_cache_hits_total";
    /// Lookups that found nothing and computed.
    pub const CACHE_MISSES_TOTAL: &str = "memora_cache_misses_total";
    /// Store failures and timeouts, by operation.
    pub const CACHE_ERRORS_TOTAL: &str = "memora_cache_errors_total";
    /// Calls that skipped the cache because the arguments had no stable key.
    pub const CACHE_BYPASS_TOTAL: &str = "memora_cache_bypass_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::CACHE_HITS_TOTAL,
        "Total number of memoized calls answered from the cache"
    );
    describe_counter!(
        names::CACHE_MISSES_TOTAL,
        "Total number of memoized calls that computed a fresh result"
    );
    describe_counter!(
        names::CACHE_ERRORS_TOTAL,
        "Total number of cache store failures and timeouts"
    );
    describe_counter!(
        names::CACHE_BYPASS_TOTAL,
        "Total number of memoized calls that bypassed the cache"
    );
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn hit(function: &str) {
        counter!(names::CACHE_HITS_TOTAL, "function" => function.to_string()).increment(1);
    }

    /// Record a cache miss.
    pub fn miss(function: &str) {
        counter!(names::CACHE_MISSES_TOTAL, "function" => function.to_string()).increment(1);
    }

    /// Record a failed or timed out store operation.
    pub fn error(operation: &'static str, backend: &'static str) {
        counter!(
            names::CACHE_ERRORS_TOTAL,
            "operation" => operation,
            "backend" => backend
        )
        .increment(1);
    }

    /// Record a call that skipped the cache.
    pub fn bypass(function: &str) {
        counter!(names::CACHE_BYPASS_TOTAL, "function" => function.to_string()).increment(1);
    }
}
