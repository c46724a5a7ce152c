//! DTOs for API responses.

use serde::{Deserialize, Serialize};

use reach_cache::CacheStats;
use reach_delivery::StatsSnapshot;

/// Response for `GET /dimensions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DimensionsResponse {
    /// Distinct dimension names, sorted
    pub dimensions: Vec<String>,
}

/// Response for `GET /dimensions/:dimension/values`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DimensionValuesResponse {
    /// The dimension asked about
    pub dimension: String,
    /// Distinct values used by rules on that dimension, sorted
    pub values: Vec<String>,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" when the process answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since the state was built
    pub uptime_seconds: u64,
    /// Payloads currently cached, live or not yet swept
    pub cache_entries: usize,
}

/// Response for `GET /stats`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Delivery counters
    pub delivery: StatsSnapshot,
    /// Cache occupancy
    pub cache: CacheStats,
}
