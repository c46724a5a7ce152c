//! # REACH Delivery
//!
//! Ties request validation, the response cache, and the targeting engine
//! together.
//!
//! 1. Validate the raw parameters (mandatory dimensions, pagination)
//! 2. Derive the cache key and serve a cached payload if one is live
//! 3. Otherwise resolve, serialize, cache for five minutes, and return
//!
//! ## Example
//!
//! ```rust,ignore
//! use reach_delivery::DeliveryService;
//!
//! let service = DeliveryService::new(engine, cache);
//! let delivery = service
//!     .deliver_params([("app_id", "com.game"), ("country", "US"), ("os", "android")])
//!     .await?;
//! println!("{} {}", delivery.cache_status, String::from_utf8_lossy(&delivery.payload));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod observer;
mod request;
mod service;

pub use observer::{DeliveryStats, StatsSnapshot, TracingObserver};
pub use request::{parse_params, parse_query_string};
pub use service::{CacheStatus, Delivery, DeliveryService};
