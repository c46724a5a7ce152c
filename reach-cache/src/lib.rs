//! Response cache for REACH.
//!
//! Bounded in-memory TTL cache for serialized delivery payloads, the
//! background sweeper that clears expired entries, and canonical cache keys
//! for targeting requests.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod clock;
mod key;
mod sweeper;

pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use sweeper::CacheSweeper;
