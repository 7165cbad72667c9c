//! Concurrency and capacity properties of the memory store.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use ipxpress_cache::{CacheConfig, CacheStore, MemoryCacheStore};
use ipxpress_core::{CacheEntry, CacheKey, ProcessingSpec};
use proptest::prelude::*;

fn key(n: u32) -> CacheKey {
    CacheKey::derive(&ProcessingSpec::new(format!("https://img.test/{n}.png")))
}

#[test]
fn concurrent_readers_and_writers_stay_consistent() {
    let store = Arc::new(
        MemoryCacheStore::new(
            CacheConfig::new()
                .with_max_entries(64)
                .with_ttl(Duration::from_secs(60)),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8u32)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500u32 {
                    let k = key((worker * 31 + i) % 128);
                    if i % 3 == 0 {
                        let payload = Bytes::from(i.to_le_bytes().to_vec());
                        store.set(k, CacheEntry::passthrough(payload));
                    } else if let Some(entry) = store.get(&k) {
                        assert!(!entry.is_error());
                        assert_eq!(entry.payload.len(), 4);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(store.len() <= 64);
    let stats = store.stats();
    assert_eq!(stats.hits + stats.misses, 8 * 500 - 8 * 167);
}

#[test]
fn failures_are_replayed_until_expiry() {
    let config = CacheConfig::new().with_ttl(Duration::from_millis(40));
    let store = MemoryCacheStore::new(config).unwrap();
    let k = key(7);
    store.set(k.clone(), CacheEntry::failure(400, "image fetch failed with status 404"));

    let replay = store.get(&k).unwrap();
    assert_eq!(replay.status_code, 400);
    assert_eq!(replay.error.as_deref(), Some("image fetch failed with status 404"));

    thread::sleep(Duration::from_millis(80));
    assert!(store.get(&k).is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Live entries never exceed capacity, whatever the insertion pattern.
    #[test]
    fn prop_len_never_exceeds_capacity(
        capacity in 1usize..32,
        inserts in proptest::collection::vec(0u32..64, 0..200),
    ) {
        let store = MemoryCacheStore::new(
            CacheConfig::new()
                .with_max_entries(capacity)
                .with_ttl(Duration::from_secs(60)),
        )
        .unwrap();

        for n in inserts {
            store.set(key(n), CacheEntry::passthrough(Bytes::from_static(b"x")));
            prop_assert!(store.len() <= capacity);
        }
    }

    /// The most recently written key is always retrievable.
    #[test]
    fn prop_last_write_is_visible(
        capacity in 1usize..16,
        inserts in proptest::collection::vec(0u32..64, 1..100),
    ) {
        let store = MemoryCacheStore::new(CacheConfig::new().with_max_entries(capacity)).unwrap();
        let mut last = None;
        for n in inserts {
            store.set(key(n), CacheEntry::passthrough(Bytes::from_static(b"x")));
            last = Some(n);
        }
        if let Some(n) = last {
            prop_assert!(store.get(&key(n)).is_some());
        }
    }
}
