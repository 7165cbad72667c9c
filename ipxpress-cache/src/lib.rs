//! ipxpress cache - processed-result store
//!
//! Maps a [`CacheKey`](ipxpress_core::CacheKey) to the
//! [`CacheEntry`](ipxpress_core::CacheEntry) produced for it. Failures are
//! cached like successes so a broken origin is not hammered for every
//! request. Entries expire after a TTL and the store never holds more than its
//! capacity; the least recently used entry makes room for a new one.

mod config;
mod janitor;
mod memory;
mod traits;

pub use config::CacheConfig;
pub use janitor::Janitor;
pub use memory::MemoryCacheStore;
pub use traits::{CacheStats, CacheStore};
