//! Bounded in-memory cache for upstream lookup results.
//!
//! Entries expire `ttl` after insertion and are purged lazily on the next access; the
//! least-recently-used entry is evicted whenever an insert pushes the cache over capacity.
//! Recency order is independent of expiry.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use linked_hash_map::LinkedHashMap;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default maximum number of entries.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    // `None` when the TTL reaches past the clock's range; such entries never expire.
    expires_at: Option<Instant>,
}

#[derive(Debug)]
struct CacheInner<K: Eq + Hash, V> {
    // Front is least recently used, back is most recently used.
    map: LinkedHashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Cumulative cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub const fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// `hits / (hits + misses)`, or 0 before the first access.
    pub fn hit_rate(&self) -> f64 {
        match self.total_requests() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

/// Thread-safe LRU cache with per-entry TTL.
///
/// Cloning yields another handle to the same underlying store.
#[derive(Debug)]
pub struct TtlLruCache<K: Eq + Hash, V> {
    inner: Arc<Mutex<CacheInner<K, V>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    capacity: usize,
}

impl<K: Eq + Hash, V> Clone for TtlLruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
            ttl: self.ttl,
            capacity: self.capacity,
        }
    }
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    /// Create a cache with the given TTL and capacity on the system clock.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self::with_clock(ttl, capacity, Arc::new(SystemClock))
    }

    /// Create a cache with the default TTL (5 minutes) and capacity (1000).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    pub fn with_clock(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(
            ttl_seconds = ttl.as_secs(),
            capacity,
            "cache initialized"
        );
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                map: LinkedHashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            })),
            clock,
            ttl,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a value.
    ///
    /// A live entry is refreshed to most-recently-used and counted as a hit. An expired
    /// entry is removed and counted as a miss, as is an absent key.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.map.get(key).map(|entry| entry.expires_at.is_some_and(|at| now >= at)) {
            None => {
                inner.misses += 1;
                None
            }
            Some(true) => {
                inner.map.remove(key);
                inner.misses += 1;
                tracing::debug!(%key, "cache expired");
                None
            }
            Some(false) => {
                inner.hits += 1;
                tracing::debug!(%key, "cache hit");
                inner.map.get_refresh(key).map(|entry| entry.value.clone())
            }
        }
    }

    /// Insert or replace a value and return how many entries were evicted to make room.
    pub fn put(&self, key: K, value: V) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();

        // Remove first so a replaced key moves to the most-recently-used end.
        inner.map.remove(&key);
        inner.map.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now.checked_add(self.ttl),
            },
        );

        let mut evicted = 0;
        while inner.map.len() > self.capacity {
            let Some((oldest, _)) = inner.map.pop_front() else {
                break;
            };
            inner.evictions += 1;
            evicted += 1;
            tracing::debug!(key = %oldest, "cache eviction");
        }

        tracing::debug!(%key, "cache put");
        evicted
    }

    /// Remove an entry. Returns `true` when the key was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.lock().map.remove(key).is_some();
        if removed {
            tracing::debug!(%key, "cache invalidated");
        }
        removed
    }

    /// Drop every entry; counters are kept.
    pub fn clear(&self) {
        self.lock().map.clear();
        tracing::info!("cache cleared");
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Age of an entry, if present. Does not touch recency or counters.
    pub fn age(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        self.lock()
            .map
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.inserted_at))
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.map.len(),
            capacity: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
