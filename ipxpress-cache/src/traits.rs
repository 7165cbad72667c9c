//! Cache store trait and statistics.

use std::sync::Arc;

use ipxpress_core::{CacheEntry, CacheKey};

/// Key → outcome store with expiry and bounded size.
///
/// Implementations must be safe under concurrent readers and writers, must
/// never return an expired entry, and must never hold more than their
/// configured capacity of live entries.
pub trait CacheStore: Send + Sync {
    /// Look up a live entry. Expired entries count as misses.
    fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>>;

    /// Store `entry` under `key`, stamping its creation time and replacing any
    /// previous entry. May evict the least recently used entry.
    fn set(&self, key: CacheKey, entry: CacheEntry) -> Arc<CacheEntry>;

    /// Remove every expired entry, returning how many were dropped.
    fn purge_expired(&self) -> usize;

    /// Number of stored entries, including expired ones not yet purged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&self);

    /// Snapshot of usage counters.
    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired lookups.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries dropped because they expired.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
