//! Bounded LRU cache with per-entry TTL (spec §4.4), used for format-output caching and
//! sink-lifecycle dedup keys.

use std::hash::Hash;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Lru,
    Ttl,
    Manual,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions_lru: u64,
    pub evictions_ttl: u64,
    pub evictions_manual: u64,
}

impl CacheStats {
    pub fn size_based_hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// Thread-safe LRU cache with optional default TTL. Every operation takes the single
/// internal lock exclusively (`Get` mutates recency order, so a shared lock would not
/// help readers anyway).
pub struct TtlLruCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    default_ttl: Option<Duration>,
}

struct Inner<K: Hash + Eq, V> {
    lru: LruCache<K, Entry<V>>,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlLruCache<K, V> {
    pub fn new(capacity: usize, default_ttl: Option<Duration>) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(Inner { lru: LruCache::new(capacity), stats: CacheStats::default() }),
            default_ttl,
        }
    }

    /// Promotes on hit; returns miss if absent or expired. Expired entries are removed
    /// opportunistically on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.lru.peek(key) {
            Some(entry) => entry.expires_at.is_some_and(|exp| Instant::now() >= exp),
            None => {
                inner.stats.misses += 1;
                return None;
            }
        };
        if expired {
            inner.lru.pop(key);
            inner.stats.misses += 1;
            inner.stats.evictions_ttl += 1;
            return None;
        }
        inner.stats.hits += 1;
        inner.lru.get(key).map(|e| e.value.clone())
    }

    /// Insert at MRU head with an explicit TTL (falls back to the cache's default TTL
    /// when `None`), evicting the LRU tail if the cache is over capacity.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|d| Instant::now() + d);
        let mut inner = self.inner.lock();
        let was_full = inner.lru.len() == inner.lru.cap().get() && !inner.lru.contains(&key);
        inner.lru.put(key, Entry { value, expires_at });
        if was_full {
            inner.stats.evictions_lru += 1;
        }
    }

    pub fn delete(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let existed = inner.lru.pop(key).is_some();
        if existed {
            inner.stats.evictions_manual += 1;
        }
        existed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
    }

    /// Background sweep removing all currently-expired entries; returns the count removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let expired_keys: Vec<K> = inner
            .lru
            .iter()
            .filter(|(_, e)| e.expires_at.is_some_and(|exp| now >= exp))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired_keys {
            inner.lru.pop(k);
        }
        inner.stats.evictions_ttl += expired_keys.len() as u64;
        expired_keys.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().lru.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
