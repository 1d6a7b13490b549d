//! Result Cache
//!
//! Time-expiring, size-bounded store of `key -> Classification`.
//!
//! - Entries older than the TTL read as misses but stay physically present
//!   until a sweep, so the rate-limited path can still serve them as stale.
//! - When the entry count exceeds capacity, the oldest writes are removed
//!   first. Reads never extend an entry's life.
//! - Only successful classifications are ever stored.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tokio_emotion_orchestrator::enhanced::ResultCache;
//! use tokio_emotion_orchestrator::{normalize, Classification, Emotion};
//!
//! let cache = ResultCache::new(Duration::from_secs(900), 500);
//! let key = normalize("I am so happy today!");
//! cache.put(&key, Classification::new(Emotion::Joy, 0.82, "primary"));
//! assert!(cache.get(&key).is_some());
//! ```

use crate::{Classification, NormalizedKey};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache entry owned by the cache; callers only ever see clones of the
/// classification.
#[derive(Debug, Clone)]
struct CacheEntry {
    classification: Classification,
    created_at: Instant,
}

/// Shared, clonable result cache.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<DashMap<NormalizedKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    /// Create a cache with the given TTL and capacity.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Fresh cached value, or `None` on a miss or an expired entry.
    pub fn get(&self, key: &NormalizedKey) -> Option<Classification> {
        let entry = self.store.get(key)?;
        if entry.created_at.elapsed() < self.ttl {
            debug!(key = %key, "cache hit");
            Some(entry.classification.clone())
        } else {
            debug!(key = %key, "cache entry expired");
            None
        }
    }

    /// Most recent cached value regardless of TTL, as long as it has not been
    /// swept or evicted yet.
    pub fn get_stale(&self, key: &NormalizedKey) -> Option<Classification> {
        self.store.get(key).map(|e| e.classification.clone())
    }

    /// Store a classification, replacing any previous entry for `key`, then
    /// restore the size bound.
    pub fn put(&self, key: &NormalizedKey, classification: Classification) {
        self.store.insert(
            key.clone(),
            CacheEntry {
                classification,
                created_at: Instant::now(),
            },
        );
        debug!(key = %key, entries = self.store.len(), "cached");

        if self.store.len() > self.max_entries {
            self.evict_expired_and_excess();
        }
    }

    /// Physically remove expired entries, then the oldest entries until the
    /// count is back within capacity. Returns how many entries were removed.
    pub fn evict_expired_and_excess(&self) -> usize {
        let before = self.store.len();
        let ttl = self.ttl;
        self.store.retain(|_, entry| entry.created_at.elapsed() < ttl);

        let len = self.store.len();
        if len > self.max_entries {
            // Collect first so no shard guard is held while removing.
            let mut by_age: Vec<(NormalizedKey, Instant)> = self
                .store
                .iter()
                .map(|e| (e.key().clone(), e.value().created_at))
                .collect();
            by_age.sort_by_key(|(_, created_at)| *created_at);

            for (key, _) in by_age.into_iter().take(len - self.max_entries) {
                self.store.remove(&key);
            }
        }

        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!(removed = removed, entries = self.store.len(), "cache evicted");
        }
        removed
    }

    /// Remove one entry.
    pub fn delete(&self, key: &NormalizedKey) {
        self.store.remove(key);
    }

    /// Clear all cached values.
    pub fn clear(&self) {
        self.store.clear();
        debug!("cleared result cache");
    }

    /// Number of physically present entries, fresh or not.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let fresh = self
            .store
            .iter()
            .filter(|e| e.value().created_at.elapsed() < self.ttl)
            .count();
        CacheStats {
            entries: self.store.len(),
            fresh,
            capacity: self.max_entries,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries physically present.
    pub entries: usize,
    /// Entries still inside the TTL.
    pub fresh: usize,
    /// Configured capacity.
    pub capacity: usize,
}
