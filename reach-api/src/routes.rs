//! API route configuration.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::handlers;
use crate::middleware::request_id;
use crate::state::AppState;

/// Creates the API router with all routes configured.
///
/// Every route answers other methods with 405; unknown paths get a JSON 404.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Delivery
        .route(
            "/delivery",
            get(handlers::delivery).fallback(handlers::method_not_allowed),
        )

        // Discovery
        .route(
            "/dimensions",
            get(handlers::list_dimensions).fallback(handlers::method_not_allowed),
        )
        .route(
            "/dimensions/:dimension/values",
            get(handlers::dimension_values).fallback(handlers::method_not_allowed),
        )

        // Operations
        .route(
            "/health",
            get(handlers::health_check).fallback(handlers::method_not_allowed),
        )
        .route(
            "/stats",
            get(handlers::stats).fallback(handlers::method_not_allowed),
        )

        .fallback(handlers::not_found)
        .with_state(state)
        .layer(middleware::from_fn(request_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use reach_core::error::{ReachError, Result};
    use reach_core::traits::RuleStore;
    use reach_core::types::{Campaign, CampaignStatus, CampaignSummary, RuleAggregate, TargetingRule};
    use reach_store::MemoryRuleStore;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::dto::{DimensionValuesResponse, DimensionsResponse, HealthResponse, StatsResponse};
    use crate::error::ErrorResponse;
    use crate::state::ApiConfig;

    fn seeded_store() -> MemoryRuleStore {
        let store = MemoryRuleStore::new();
        store
            .upsert_campaign(Campaign::new("spotify", "Spotify", "https://cdn/spotify.png", "Download"))
            .unwrap();
        store
            .upsert_campaign(Campaign::new("duolingo", "Duolingo", "https://cdn/duo.png", "Install"))
            .unwrap();
        store
            .upsert_campaign(
                Campaign::new("subwaysurfer", "Subway", "https://cdn/sub.png", "Play")
                    .with_status(CampaignStatus::Inactive),
            )
            .unwrap();
        store
            .upsert_rule(TargetingRule::include("spotify", "country", "US"))
            .unwrap();
        store
            .upsert_rule(TargetingRule::include("spotify", "country", "CA"))
            .unwrap();
        store
            .upsert_rule(TargetingRule::exclude("duolingo", "country", "US"))
            .unwrap();
        store
            .upsert_rule(TargetingRule::include("duolingo", "os", "android"))
            .unwrap();
        store
    }

    fn app_with(store: Arc<dyn RuleStore>) -> Router {
        create_router(Arc::new(AppState::new(ApiConfig::default(), store)))
    }

    fn test_app() -> Router {
        app_with(Arc::new(seeded_store()))
    }

    async fn get_uri(app: Router, uri: &str) -> Response<Body> {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_delivery_miss_then_hit() {
        let app = test_app();

        let first = get_uri(app.clone(), "/delivery?app_id=com.game&country=CA&os=android").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(header(&first, "x-cache"), Some("MISS"));
        assert_eq!(header(&first, "content-type"), Some("application/json"));
        let first: Vec<CampaignSummary> = body_json(first).await;
        let ids: Vec<_> = first.iter().map(|c| c.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["duolingo", "spotify"]);

        let second = get_uri(app, "/delivery?os=android&app_id=com.game&country=CA").await;
        assert_eq!(header(&second, "x-cache"), Some("HIT"));
        let second: Vec<CampaignSummary> = body_json(second).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_delivery_exclude_wins() {
        let response = get_uri(test_app(), "/delivery?app_id=a&country=US&os=android").await;
        let body: Vec<CampaignSummary> = body_json(response).await;
        let ids: Vec<_> = body.iter().map(|c| c.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["spotify"]);
    }

    #[tokio::test]
    async fn test_delivery_empty_result() {
        let response = get_uri(test_app(), "/delivery?app_id=a&country=DE&os=ios").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_delivery_missing_os() {
        let response = get_uri(test_app(), "/delivery?app_id=a&country=US").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "missing os parameter");
        assert_eq!(body.code, "ERR_400");
    }

    #[tokio::test]
    async fn test_delivery_invalid_limit() {
        let response = get_uri(test_app(), "/delivery?app_id=a&country=US&os=ios&limit=500").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "invalid limit parameter: 500");
    }

    #[tokio::test]
    async fn test_delivery_pagination() {
        let app = test_app();
        let response = get_uri(app, "/delivery?app_id=a&country=CA&os=android&limit=1&page=2").await;
        let body: Vec<CampaignSummary> = body_json(response).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].campaign_id, "spotify");
    }

    struct DownStore;

    #[async_trait]
    impl RuleStore for DownStore {
        async fn active_campaigns(&self, _after: Option<&str>, _limit: usize) -> Result<Vec<Campaign>> {
            Err(ReachError::Storage("dial tcp 10.0.0.7:443: connection refused".into()))
        }
        async fn rule_aggregates(&self, _dimension: &str, _value: &str) -> Result<Vec<RuleAggregate>> {
            Err(ReachError::Storage("dial tcp 10.0.0.7:443: connection refused".into()))
        }
        async fn dimensions(&self) -> Result<Vec<String>> {
            Err(ReachError::Storage("dial tcp 10.0.0.7:443: connection refused".into()))
        }
        async fn dimension_values(&self, _dimension: &str) -> Result<Vec<String>> {
            Err(ReachError::Storage("dial tcp 10.0.0.7:443: connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_generic_500() {
        let app = app_with(Arc::new(DownStore));

        let response = get_uri(app.clone(), "/delivery?app_id=a&country=US&os=ios").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "internal server error");
        assert_eq!(body.code, "ERR_500");

        let response = get_uri(app, "/dimensions").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_dimensions() {
        let response = get_uri(test_app(), "/dimensions").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: DimensionsResponse = body_json(response).await;
        assert_eq!(body.dimensions, vec!["country", "os"]);
    }

    #[tokio::test]
    async fn test_dimension_values() {
        let response = get_uri(test_app(), "/dimensions/country/values").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: DimensionValuesResponse = body_json(response).await;
        assert_eq!(body.dimension, "country");
        assert_eq!(body.values, vec!["CA", "US"]);

        let response = get_uri(test_app(), "/dimensions/language/values").await;
        let body: DimensionValuesResponse = body_json(response).await;
        assert!(body.values.is_empty());
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let app = test_app();
        get_uri(app.clone(), "/delivery?app_id=a&country=US&os=ios").await;
        get_uri(app.clone(), "/delivery?app_id=a&country=US&os=ios").await;

        let response = get_uri(app.clone(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = body_json(response).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.cache_entries, 1);

        let stats: StatsResponse = body_json(get_uri(app, "/stats").await).await;
        assert_eq!(stats.delivery.cache_hits, 1);
        assert_eq!(stats.delivery.cache_misses, 1);
        assert_eq!(stats.cache.total_entries, 1);
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("X-Request-ID", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(header(&response, "x-request-id"), Some("abc-123"));
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let response = get_uri(test_app(), "/health").await;
        let id = header(&response, "x-request-id").unwrap();
        assert!(id.starts_with("req_"));
        assert!(id.len() > 4);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/delivery?app_id=a&country=US&os=ios")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "method is not allowed");
        assert_eq!(body.code, "ERR_405");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = get_uri(test_app(), "/campaigns").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.code, "ERR_404");
    }
}
