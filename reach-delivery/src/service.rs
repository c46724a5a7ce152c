//! The delivery orchestrator.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, instrument};

use reach_cache::{CacheKey, ResponseCache};
use reach_core::constants::DELIVERY_CACHE_TTL;
use reach_core::error::Result;
use reach_core::traits::{DeliveryObserver, NoopObserver};
use reach_core::types::TargetingRequest;
use reach_engine::{TargetingEngine, TargetingPlan};

use crate::request::parse_params;

/// Where a delivery payload came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the response cache
    Hit,
    /// Resolved against the rule store
    Miss,
}

impl CacheStatus {
    /// Header representation (`HIT` / `MISS`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery response.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// JSON array of campaign summaries
    pub payload: Bytes,
    /// Hit or miss
    pub cache_status: CacheStatus,
    /// Cache key of the request
    pub key: CacheKey,
}

/// Serves targeting requests from the cache, resolving on a miss.
///
/// Only successful resolutions are cached; an empty result is a success.
#[derive(Clone)]
pub struct DeliveryService {
    engine: TargetingEngine,
    cache: Arc<ResponseCache>,
    observer: Arc<dyn DeliveryObserver>,
    ttl: Duration,
}

impl DeliveryService {
    /// Creates a service with the standard payload TTL and no observer.
    pub fn new(engine: TargetingEngine, cache: Arc<ResponseCache>) -> Self {
        Self {
            engine,
            cache,
            observer: Arc::new(NoopObserver),
            ttl: DELIVERY_CACHE_TTL,
        }
    }

    /// Replaces the observer.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the payload TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// TTL applied to every payload this service caches.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Returns the resolution engine.
    pub fn engine(&self) -> &TargetingEngine {
        &self.engine
    }

    /// Validates raw query parameters, then delivers.
    pub async fn deliver_params<I, K, V>(&self, params: I) -> Result<Delivery>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let request = parse_params(params)?;
        self.deliver(&request).await
    }

    /// Delivers a validated request.
    #[instrument(skip_all, fields(key = tracing::field::Empty))]
    pub async fn deliver(&self, request: &TargetingRequest) -> Result<Delivery> {
        let key = CacheKey::for_request(request);
        tracing::Span::current().record("key", key.as_str());

        if let Some(payload) = self.cache.get(key.as_str()) {
            self.observer.on_cache_hit(key.as_str());
            return Ok(Delivery {
                payload,
                cache_status: CacheStatus::Hit,
                key,
            });
        }
        self.observer.on_cache_miss(key.as_str());

        let start = Instant::now();
        let payload = match self.resolve(request).await {
            Ok((payload, count)) => {
                self.observer.on_resolved(count, start.elapsed());
                payload
            }
            Err(err) => {
                self.observer.on_failure(&err);
                return Err(err);
            }
        };

        self.cache.set(key.as_str(), payload.clone(), self.ttl);
        debug!(bytes = payload.len(), "Cached delivery payload");

        Ok(Delivery {
            payload,
            cache_status: CacheStatus::Miss,
            key,
        })
    }

    async fn resolve(&self, request: &TargetingRequest) -> Result<(Bytes, usize)> {
        let campaigns = self.engine.resolve(&TargetingPlan::from(request)).await?;
        let payload = serde_json::to_vec(&campaigns)?;
        Ok((Bytes::from(payload), campaigns.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::DeliveryStats;
    use async_trait::async_trait;
    use reach_core::error::ReachError;
    use reach_core::traits::RuleStore;
    use reach_core::types::{Campaign, CampaignSummary, RuleAggregate, TargetingRule};
    use reach_store::MemoryRuleStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn seeded_store() -> MemoryRuleStore {
        let store = MemoryRuleStore::new();
        for id in ["camp_1", "camp_2"] {
            store
                .upsert_campaign(Campaign::new(id, id, format!("https://cdn/{}.png", id), "Install"))
                .unwrap();
        }
        store
            .upsert_rule(TargetingRule::include("camp_1", "country", "US"))
            .unwrap();
        store
            .upsert_rule(TargetingRule::exclude("camp_2", "country", "JP"))
            .unwrap();
        store
    }

    fn service(store: Arc<dyn RuleStore>) -> (DeliveryService, Arc<DeliveryStats>) {
        let stats = Arc::new(DeliveryStats::new());
        let service = DeliveryService::new(
            TargetingEngine::new(store),
            Arc::new(ResponseCache::new()),
        )
        .with_observer(stats.clone());
        (service, stats)
    }

    fn decode(delivery: &Delivery) -> Vec<CampaignSummary> {
        serde_json::from_slice(&delivery.payload).unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit_with_reordered_params() {
        let (service, stats) = service(Arc::new(seeded_store()));

        let first = service
            .deliver_params([("app_id", "a"), ("country", "US"), ("os", "c")])
            .await
            .unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);

        let second = service
            .deliver_params([("country", "US"), ("app_id", "a"), ("os", "c")])
            .await
            .unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(first.key, second.key);
        assert_eq!(first.payload, second.payload);

        let ids: Vec<_> = decode(&first).into_iter().map(|c| c.campaign_id).collect();
        assert_eq!(ids, vec!["camp_1", "camp_2"]);

        let snap = stats.snapshot();
        assert_eq!((snap.cache_hits, snap.cache_misses), (1, 1));
    }

    #[tokio::test]
    async fn test_service_ttl_governs_expiry() {
        let clock = Arc::new(reach_cache::ManualClock::new());
        let cache = ResponseCache::new().with_clock(clock.clone());
        let service = DeliveryService::new(TargetingEngine::new(Arc::new(seeded_store())), Arc::new(cache))
            .with_ttl(Duration::from_secs(10));
        let params = [("app_id", "a"), ("country", "US"), ("os", "c")];

        assert_eq!(service.deliver_params(params).await.unwrap().cache_status, CacheStatus::Miss);
        clock.advance(Duration::from_secs(9));
        assert_eq!(service.deliver_params(params).await.unwrap().cache_status, CacheStatus::Hit);
        clock.advance(Duration::from_secs(2));
        assert_eq!(service.deliver_params(params).await.unwrap().cache_status, CacheStatus::Miss);
    }

    #[tokio::test]
    async fn test_missing_os_is_validation_error() {
        let (service, stats) = service(Arc::new(seeded_store()));
        let err = service
            .deliver_params([("app_id", "a"), ("country", "US")])
            .await
            .unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(err.public_message(), "missing os parameter");
        assert!(service.cache().is_empty());
        assert_eq!(stats.snapshot().cache_misses, 0);
    }

    #[tokio::test]
    async fn test_empty_result_is_cached_as_array() {
        let (service, _) = service(Arc::new(MemoryRuleStore::new()));
        let delivery = service
            .deliver_params([("app_id", "a"), ("country", "US"), ("os", "c")])
            .await
            .unwrap();
        assert_eq!(&delivery.payload[..], b"[]");
        assert_eq!(service.cache().len(), 1);
    }

    /// Fails until `healthy` is set.
    #[derive(Default)]
    struct FlakyStore {
        healthy: AtomicBool,
        inner: MemoryRuleStore,
    }

    #[async_trait]
    impl RuleStore for FlakyStore {
        async fn active_campaigns(&self, after: Option<&str>, limit: usize) -> Result<Vec<Campaign>> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(ReachError::Storage("connection reset".into()));
            }
            self.inner.active_campaigns(after, limit).await
        }
        async fn rule_aggregates(&self, dimension: &str, value: &str) -> Result<Vec<RuleAggregate>> {
            self.inner.rule_aggregates(dimension, value).await
        }
        async fn dimensions(&self) -> Result<Vec<String>> {
            self.inner.dimensions().await
        }
        async fn dimension_values(&self, dimension: &str) -> Result<Vec<String>> {
            self.inner.dimension_values(dimension).await
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_cached() {
        let store = Arc::new(FlakyStore::default());
        let (service, stats) = service(store.clone());
        let params = [("app_id", "a"), ("country", "US"), ("os", "c")];

        let err = service.deliver_params(params).await.unwrap_err();
        assert!(err.is_storage_error());
        assert_eq!(err.public_message(), "internal server error");
        assert!(service.cache().is_empty());
        assert_eq!(stats.snapshot().storage_failures, 1);

        store.healthy.store(true, Ordering::SeqCst);
        let delivery = service.deliver_params(params).await.unwrap();
        assert_eq!(delivery.cache_status, CacheStatus::Miss);
    }

    #[tokio::test]
    async fn test_pages_are_cached_separately() {
        let (service, _) = service(Arc::new(seeded_store()));
        let base = [("app_id", "a"), ("country", "US"), ("os", "c")];

        let page1 = service
            .deliver_params(base.iter().copied().chain([("limit", "1")]))
            .await
            .unwrap();
        let page2 = service
            .deliver_params(base.iter().copied().chain([("limit", "1"), ("page", "2")]))
            .await
            .unwrap();

        assert_eq!(page2.cache_status, CacheStatus::Miss);
        assert_eq!(decode(&page1)[0].campaign_id, "camp_1");
        assert_eq!(decode(&page2)[0].campaign_id, "camp_2");
    }
}
