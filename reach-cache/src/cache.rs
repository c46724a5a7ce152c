//! Bounded in-memory TTL cache for delivery payloads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crc32fast::Hasher as Crc32Hasher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use reach_core::constants::DEFAULT_CACHE_CAPACITY;
use reach_core::error::{ReachError, Result};
use reach_core::traits::{CacheObserver, EvictionReason, NoopObserver};

use crate::clock::{Clock, SystemClock};

fn checksum(key: &str, payload: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(key.as_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Cache entry with its expiry and checksum.
#[derive(Clone, Debug)]
struct CacheEntry {
    payload: Bytes,
    checksum: u32,
    created_at: Instant,
    /// `None` when `created_at + ttl` is not representable
    expires_at: Option<Instant>,
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn is_intact(&self, key: &str) -> bool {
        checksum(key, &self.payload) == self.checksum
    }

    fn order_key(&self) -> (Instant, u64) {
        (self.created_at, self.seq)
    }
}

/// Entries plus their creation-order index, guarded together.
#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// (created_at, seq) → key; first entry is the oldest
    order: BTreeMap<(Instant, u64), String>,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.order_key());
        Some(entry)
    }

    fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Sets the capacity.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Checks that the capacity is positive.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(ReachError::Config("cache capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Bounded TTL cache of serialized delivery payloads.
///
/// - An expired entry is never returned; it is removed on the read that
///   finds it, or by [`sweep_expired`](Self::sweep_expired).
/// - Inserting a new key at capacity evicts exactly one entry: the one with
///   the earliest creation instant. Overwriting a key never evicts.
/// - Overwriting refreshes both the creation instant and the expiry.
///
/// The map and its creation-order index share one lock, so the entry count
/// always matches the contents.
pub struct ResponseCache {
    inner: Mutex<Inner>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

impl ResponseCache {
    /// Creates a cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    ///
    /// A zero capacity is raised to one; use [`CacheConfig::validate`] to
    /// reject it instead.
    pub fn with_config(mut config: CacheConfig) -> Self {
        config.max_entries = config.max_entries.max(1);
        Self {
            inner: Mutex::new(Inner::default()),
            config,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the eviction observer.
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the payload if present and unexpired.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();
        let reason = {
            let mut inner = self.inner.lock();
            let reason = match inner.entries.get(key) {
                None => return None,
                Some(entry) if entry.is_expired(now) => EvictionReason::Expired,
                Some(entry) if !entry.is_intact(key) => EvictionReason::Corrupt,
                Some(entry) => return Some(entry.payload.clone()),
            };
            inner.remove(key);
            reason
        };

        if reason == EvictionReason::Corrupt {
            warn!(key, "Dropping corrupt cache entry");
        }
        self.observer.on_evict(key, reason);
        None
    }

    /// Stores a payload with a TTL.
    pub fn set(&self, key: &str, payload: Bytes, ttl: Duration) {
        let now = self.clock.now();
        let evicted = {
            let mut inner = self.inner.lock();

            let evicted = if inner.remove(key).is_none() && inner.entries.len() >= self.config.max_entries {
                inner.pop_oldest()
            } else {
                None
            };

            let seq = inner.next_seq;
            inner.next_seq += 1;
            let entry = CacheEntry {
                checksum: checksum(key, &payload),
                payload,
                created_at: now,
                expires_at: now.checked_add(ttl),
                seq,
            };
            inner.order.insert(entry.order_key(), key.to_string());
            inner.entries.insert(key.to_string(), entry);
            evicted
        };

        if let Some(old) = evicted {
            debug!(evicted = %old, "Cache at capacity, evicted oldest entry");
            self.observer.on_evict(&old, EvictionReason::Capacity);
        }
    }

    /// Removes an entry. Returns true if it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<String> = {
            let mut inner = self.inner.lock();
            let keys: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                inner.remove(key);
            }
            keys
        };

        for key in &expired {
            self.observer.on_evict(key, EvictionReason::Expired);
        }
        expired.len()
    }

    /// Number of entries, expired ones included until removed.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let expired = inner.entries.values().filter(|e| e.is_expired(now)).count();
        CacheStats {
            total_entries: inner.entries.len(),
            expired_entries: expired,
            valid_entries: inner.entries.len().saturating_sub(expired),
            capacity: self.config.max_entries,
        }
    }

    #[cfg(test)]
    fn corrupt(&self, key: &str) {
        if let Some(entry) = self.inner.lock().entries.get_mut(key) {
            entry.checksum ^= 0xFFFF_FFFF;
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held
    pub total_entries: usize,
    /// Held entries past their expiry
    pub expired_entries: usize,
    /// Held entries still servable
    pub valid_entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}
