//! Background purge of expired entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::traits::CacheStore;

/// Handle to the periodic purge task. Dropping it stops the task.
#[derive(Debug)]
pub struct Janitor {
    handle: JoinHandle<()>,
}

impl Janitor {
    /// Spawn a task calling `purge_expired` every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn CacheStore>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = store.len(), "purged expired cache entries");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheConfig, MemoryCacheStore};
    use bytes::Bytes;
    use ipxpress_core::{CacheEntry, CacheKey, ProcessingSpec};

    #[tokio::test]
    async fn test_janitor_purges_in_background() {
        let store = Arc::new(
            MemoryCacheStore::new(CacheConfig::new().with_ttl(Duration::from_millis(20))).unwrap(),
        );
        store.set(
            CacheKey::derive(&ProcessingSpec::new("https://img.test/a.png")),
            CacheEntry::passthrough(Bytes::from_static(b"raw")),
        );
        assert_eq!(store.len(), 1);

        let janitor = Janitor::spawn(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.len(), 0);
        janitor.stop();
    }
}
