//! Common traits for REACH.
//!
//! The rule store and the observers are injected into the engine, the cache,
//! and the orchestrator, so backends and accounting can be swapped in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ReachError, Result};
use crate::types::{Campaign, RuleAggregate};

// ═══════════════════════════════════════════════════════════════════════════════
// RULE STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read interface over campaigns and their targeting rules.
///
/// Implementations might use:
/// - In-memory maps (tests, fixtures, small deployments)
/// - SQLite / libSQL (production)
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Returns up to `limit` ACTIVE campaigns with id strictly greater than
    /// `after`, ascending by id.
    ///
    /// Passing the last id of one page as `after` yields the next page.
    async fn active_campaigns(&self, after: Option<&str>, limit: usize) -> Result<Vec<Campaign>>;

    /// Aggregates every campaign's rules on `dimension` against `value`.
    ///
    /// Campaigns with no rules on the dimension are omitted.
    async fn rule_aggregates(&self, dimension: &str, value: &str) -> Result<Vec<RuleAggregate>>;

    /// Distinct dimension names that carry at least one rule, sorted.
    async fn dimensions(&self) -> Result<Vec<String>>;

    /// Distinct values used by rules on a dimension, sorted.
    async fn dimension_values(&self, dimension: &str) -> Result<Vec<String>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// OBSERVER TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Why an entry left the response cache without an explicit delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// Capacity reached; the oldest entry made room for a new key
    Capacity,
    /// TTL elapsed (found on read or by a sweep)
    Expired,
    /// Stored payload failed its checksum
    Corrupt,
}

impl EvictionReason {
    /// Short label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Capacity => "capacity",
            EvictionReason::Expired => "expired",
            EvictionReason::Corrupt => "corrupt",
        }
    }
}

/// Receives cache eviction events.
pub trait CacheObserver: Send + Sync {
    /// Called once per entry removed by the cache itself.
    fn on_evict(&self, _key: &str, _reason: EvictionReason) {}
}

/// Receives delivery outcome events.
pub trait DeliveryObserver: Send + Sync {
    /// Payload served from the cache.
    fn on_cache_hit(&self, _key: &str) {}

    /// No usable cache entry; resolution follows.
    fn on_cache_miss(&self, _key: &str) {}

    /// Resolution finished with `count` campaigns.
    fn on_resolved(&self, _count: usize, _elapsed: Duration) {}

    /// Delivery failed after validation.
    fn on_failure(&self, _error: &ReachError) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}

impl DeliveryObserver for NoopObserver {}
