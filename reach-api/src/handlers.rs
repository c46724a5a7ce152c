//! API route handlers.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderName, HeaderValue},
    response::IntoResponse,
    Json,
};
use tracing::debug;

use reach_core::error::{ReachError, Result as ReachResult};
use reach_delivery::parse_query_string;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Header reporting whether a delivery came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// GET /delivery
pub async fn delivery(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse> {
    let request = parse_query_string(query.as_deref().unwrap_or_default())?;
    let delivery = state.service.deliver(&request).await?;

    debug!(
        key = %delivery.key,
        cache = %delivery.cache_status,
        bytes = delivery.payload.len(),
        "Delivered campaigns"
    );

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (X_CACHE, HeaderValue::from_static(delivery.cache_status.as_str())),
        ],
        delivery.payload,
    ))
}

/// GET /dimensions
pub async fn list_dimensions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DimensionsResponse>> {
    let dimensions = bounded(&state, state.store.dimensions()).await?;
    Ok(Json(DimensionsResponse { dimensions }))
}

/// GET /dimensions/:dimension/values
pub async fn dimension_values(
    State(state): State<Arc<AppState>>,
    Path(dimension): Path<String>,
) -> Result<Json<DimensionValuesResponse>> {
    let dimension = dimension.trim().to_string();
    if dimension.is_empty() {
        return Err(ApiError::bad_request("missing dimension parameter"));
    }
    let values = bounded(&state, state.store.dimension_values(&dimension)).await?;
    Ok(Json(DimensionValuesResponse { dimension, values }))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cache_entries: state.service.cache().len(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        delivery: state.stats.snapshot(),
        cache: state.service.cache().stats(),
    })
}

/// Known path, wrong method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// Unknown path.
pub async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}

/// Applies the configured store budget to a discovery query.
async fn bounded<T>(
    state: &AppState,
    call: impl Future<Output = ReachResult<T>>,
) -> ReachResult<T> {
    let budget = state.config.store_timeout;
    tokio::time::timeout(budget, call)
        .await
        .map_err(|_| ReachError::StorageTimeout {
            millis: budget.as_millis() as u64,
        })?
}
