//! Delivery and cache observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use reach_core::error::ReachError;
use reach_core::traits::{CacheObserver, DeliveryObserver, EvictionReason};

/// Observer that reports every event as a tracing event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn on_cache_hit(&self, key: &str) {
        debug!(key, "Cache hit");
    }

    fn on_cache_miss(&self, key: &str) {
        debug!(key, "Cache miss");
    }

    fn on_resolved(&self, count: usize, elapsed: Duration) {
        info!(count, elapsed_ms = elapsed.as_millis() as u64, "Resolved campaigns");
    }

    fn on_failure(&self, error: &ReachError) {
        error!(error = %error, "Delivery failed");
    }
}

impl CacheObserver for TracingObserver {
    fn on_evict(&self, key: &str, reason: EvictionReason) {
        debug!(key, reason = reason.as_str(), "Cache entry evicted");
    }
}

/// Atomic delivery counters.
///
/// Failures are also logged with their full detail.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    hits: AtomicU64,
    misses: AtomicU64,
    resolved: AtomicU64,
    campaigns_served: AtomicU64,
    resolve_micros: AtomicU64,
    storage_failures: AtomicU64,
    other_failures: AtomicU64,
    evicted_capacity: AtomicU64,
    evicted_expired: AtomicU64,
    evicted_corrupt: AtomicU64,
}

impl DeliveryStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let resolved = self.resolved.load(Ordering::Relaxed);
        let lookups = hits + misses;

        StatsSnapshot {
            cache_hits: hits,
            cache_misses: misses,
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            resolutions: resolved,
            campaigns_served: self.campaigns_served.load(Ordering::Relaxed),
            avg_resolve_ms: if resolved == 0 {
                0.0
            } else {
                self.resolve_micros.load(Ordering::Relaxed) as f64 / resolved as f64 / 1000.0
            },
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            other_failures: self.other_failures.load(Ordering::Relaxed),
            evicted_capacity: self.evicted_capacity.load(Ordering::Relaxed),
            evicted_expired: self.evicted_expired.load(Ordering::Relaxed),
            evicted_corrupt: self.evicted_corrupt.load(Ordering::Relaxed),
        }
    }
}

impl DeliveryObserver for DeliveryStats {
    fn on_cache_hit(&self, _key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn on_cache_miss(&self, _key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn on_resolved(&self, count: usize, elapsed: Duration) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
        self.campaigns_served.fetch_add(count as u64, Ordering::Relaxed);
        self.resolve_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn on_failure(&self, error: &ReachError) {
        if error.is_storage_error() {
            self.storage_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.other_failures.fetch_add(1, Ordering::Relaxed);
        }
        error!(error = %error, "Delivery failed");
    }
}

impl CacheObserver for DeliveryStats {
    fn on_evict(&self, _key: &str, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::Capacity => &self.evicted_capacity,
            EvictionReason::Expired => &self.evicted_expired,
            EvictionReason::Corrupt => &self.evicted_corrupt,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serializable view of [`DeliveryStats`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Requests served from the cache
    pub cache_hits: u64,
    /// Requests that needed resolution
    pub cache_misses: u64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
    /// Successful resolutions
    pub resolutions: u64,
    /// Campaigns returned across all resolutions
    pub campaigns_served: u64,
    /// Mean resolution latency
    pub avg_resolve_ms: f64,
    /// Store errors and timeouts
    pub storage_failures: u64,
    /// Serialization and other internal failures
    pub other_failures: u64,
    /// Entries evicted at capacity
    pub evicted_capacity: u64,
    /// Entries removed after expiry
    pub evicted_expired: u64,
    /// Entries dropped for a bad checksum
    pub evicted_corrupt: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = DeliveryStats::new();
        stats.on_cache_miss("k");
        stats.on_resolved(3, Duration::from_millis(4));
        stats.on_cache_hit("k");
        stats.on_cache_hit("k");
        stats.on_failure(&ReachError::StorageTimeout { millis: 2000 });
        stats.on_failure(&ReachError::Internal("x".into()));
        stats.on_evict("k", EvictionReason::Expired);

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.campaigns_served, 3);
        assert_eq!(snap.storage_failures, 1);
        assert_eq!(snap.other_failures, 1);
        assert_eq!(snap.evicted_expired, 1);
        assert!((snap.hit_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!((snap.avg_resolve_ms - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = DeliveryStats::new().snapshot();
        assert_eq!(snap.hit_ratio, 0.0);
        assert_eq!(snap.avg_resolve_ms, 0.0);
    }
}
