//! In-process TTL + LRU store.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ipxpress_core::{CacheEntry, CacheKey, ConfigError};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::config::CacheConfig;
use crate::traits::{CacheStats, CacheStore};

#[derive(Debug)]
struct Stored {
    entry: Arc<CacheEntry>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Stored {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Mutex-guarded LRU with per-entry expiry.
///
/// Both `get` and `set` refresh recency. When full, `set` evicts the least
/// recently used entry; expired entries are dropped on lookup or by
/// [`CacheStore::purge_expired`].
#[derive(Debug)]
pub struct MemoryCacheStore {
    inner: Mutex<LruCache<CacheKey, Stored>>,
    config: CacheConfig,
    counters: Counters,
}

impl MemoryCacheStore {
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity =
            NonZeroUsize::new(config.max_entries).ok_or_else(|| ConfigError::InvalidValue {
                field: "cache_capacity".to_string(),
                value: config.max_entries.to_string(),
                reason: "cache capacity must be greater than zero".to_string(),
            })?;

        Ok(Self {
            inner: Mutex::new(LruCache::new(capacity)),
            config,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let now = Instant::now();
        let mut guard = self.inner.lock();

        let expired = match guard.get(key) {
            Some(stored) if !stored.is_expired(now) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&stored.entry));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            guard.pop(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            trace!(cache_key = %key, "cache entry expired");
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn set(&self, key: CacheKey, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry.restamped());
        let ttl = self.config.ttl_for(entry.is_error());
        let stored = Stored {
            entry: Arc::clone(&entry),
            expires_at: Instant::now().checked_add(ttl),
        };

        let mut guard = self.inner.lock();
        if let Some((evicted_key, _)) = guard.push(key.clone(), stored) {
            // `push` also returns the old value when replacing the same key.
            if evicted_key != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(cache_key = %evicted_key, "cache entry evicted");
            }
        }
        entry
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock();

        let expired: Vec<CacheKey> = guard
            .iter()
            .filter(|(_, stored)| stored.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            guard.pop(key);
        }

        self.counters
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ipxpress_core::ProcessingSpec;
    use std::time::Duration;

    fn key(n: u32) -> CacheKey {
        CacheKey::derive(&ProcessingSpec::new(format!("https://img.test/{n}.png")))
    }

    fn entry(body: &'static [u8]) -> CacheEntry {
        CacheEntry::success("image/png", Bytes::from_static(body))
    }

    fn store(max_entries: usize, ttl: Duration) -> MemoryCacheStore {
        MemoryCacheStore::new(
            CacheConfig::new()
                .with_max_entries(max_entries)
                .with_ttl(ttl),
        )
        .unwrap()
    }

    #[test]
    fn test_get_after_set() {
        let cache = store(10, Duration::from_secs(60));
        cache.set(key(1), entry(b"one"));

        let hit = cache.get(&key(1)).unwrap();
        assert_eq!(hit.payload.as_ref(), b"one");
        assert!(cache.get(&key(2)).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_set_replaces_existing() {
        let cache = store(10, Duration::from_secs(60));
        cache.set(key(1), entry(b"old"));
        cache.set(key(1), entry(b"new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(1)).unwrap().payload.as_ref(), b"new");
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_expired_entry_is_never_returned() {
        let cache = store(10, Duration::from_millis(30));
        cache.set(key(1), entry(b"one"));
        std::thread::sleep(Duration::from_millis(60));

        assert!(cache.get(&key(1)).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_error_entries_use_error_ttl() {
        let cache = MemoryCacheStore::new(
            CacheConfig::new()
                .with_ttl(Duration::from_secs(60))
                .with_error_ttl(Duration::from_millis(30)),
        )
        .unwrap();
        cache.set(key(1), CacheEntry::failure(400, "boom"));
        cache.set(key(2), entry(b"ok"));
        std::thread::sleep(Duration::from_millis(60));

        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = store(2, Duration::from_secs(60));
        cache.set(key(1), entry(b"one"));
        cache.set(key(2), entry(b"two"));

        // Touch 1 so that 2 becomes least recently used.
        assert!(cache.get(&key(1)).is_some());
        cache.set(key(3), entry(b"three"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = store(10, Duration::from_millis(30));
        cache.set(key(1), entry(b"one"));
        cache.set(key(2), entry(b"two"));
        std::thread::sleep(Duration::from_millis(60));
        cache.set(key(3), entry(b"three"));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let cache = store(10, Duration::from_secs(u64::MAX));
        cache.set(key(1), entry(b"one"));

        assert!(cache.get(&key(1)).is_some());
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_clear() {
        let cache = store(10, Duration::from_secs(60));
        cache.set(key(1), entry(b"one"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(MemoryCacheStore::new(CacheConfig::new().with_max_entries(0)).is_err());
    }

    #[test]
    fn test_set_stamps_creation_time() {
        let cache = store(10, Duration::from_secs(60));
        let mut stale = entry(b"one");
        stale.created_at = chrono_epoch();
        let stored = cache.set(key(1), stale);
        assert!(stored.created_at > chrono_epoch());
    }

    fn chrono_epoch() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::<chrono::Utc>::UNIX_EPOCH
    }
}
