//! Service constants for REACH.
//!
//! Dimension names, pagination bounds, and cache defaults shared by the
//! orchestrator, the cache, and the HTTP layer.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// TARGETING DIMENSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application identifier dimension.
pub const DIM_APP_ID: &str = "app_id";

/// Country dimension.
pub const DIM_COUNTRY: &str = "country";

/// Operating system dimension.
pub const DIM_OS: &str = "os";

/// Dimensions every delivery request must carry, in validation order.
///
/// The first missing one determines the error returned to the caller.
pub const MANDATORY_DIMENSIONS: [&str; 3] = [DIM_APP_ID, DIM_COUNTRY, DIM_OS];

// ═══════════════════════════════════════════════════════════════════════════════
// PAGINATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Query parameter carrying the 1-based page number.
pub const PAGE_PARAM: &str = "page";

/// Query parameter carrying the page size.
pub const LIMIT_PARAM: &str = "limit";

/// Page used when the request does not name one.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when the request does not name one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Time-to-live of a cached delivery payload.
pub const DELIVERY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of cached payloads.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default interval between background sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Namespace token prefixed to every delivery cache key.
pub const CACHE_KEY_NAMESPACE: &str = "delivery";

/// Separator between the parts of a cache key.
pub const CACHE_KEY_DELIMITER: &str = ":";

// ═══════════════════════════════════════════════════════════════════════════════
// RULE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Upper bound on a single rule store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of campaigns fetched per keyset page while resolving.
pub const DEFAULT_SCAN_BATCH: usize = 500;

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT-FACING MESSAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Returned when `app_id` is missing or blank.
pub const ERR_MISSING_APP: &str = "missing app parameter";

/// Returned when `country` is missing or blank.
pub const ERR_MISSING_COUNTRY: &str = "missing country parameter";

/// Returned when `os` is missing or blank.
pub const ERR_MISSING_OS: &str = "missing os parameter";

/// Generic message for storage and serialization failures.
pub const ERR_INTERNAL: &str = "internal server error";

/// Returned when an endpoint is called with the wrong HTTP method.
pub const ERR_METHOD_NOT_ALLOWED: &str = "method is not allowed";

/// Maps a mandatory dimension to the message reported when it is missing.
pub fn missing_dimension_message(dimension: &str) -> String {
    match dimension {
        DIM_APP_ID => ERR_MISSING_APP.to_string(),
        DIM_COUNTRY => ERR_MISSING_COUNTRY.to_string(),
        DIM_OS => ERR_MISSING_OS.to_string(),
        other => format!("missing {} parameter", other),
    }
}
