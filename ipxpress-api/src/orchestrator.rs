//! Per-request lifecycle: key, cache, fetch, gate, transform, cache write.

use std::sync::Arc;
use std::time::Instant;

use ipxpress_cache::CacheStore;
use ipxpress_core::{CacheEntry, CacheKey, FetchError, IpxError, ProcessingSpec, TransformError};
use ipxpress_fetch::{FetchedImage, Fetcher};
use ipxpress_transform::{TransformOutput, TransformPipeline};
use tracing::{debug, error, warn};

use crate::gate::ConcurrencyGate;
use crate::telemetry::with_metrics;

/// Whether an answer came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// The single answer produced for one request.
#[derive(Debug, Clone)]
pub struct Served {
    pub entry: Arc<CacheEntry>,
    pub cache: CacheStatus,
}

/// Drives a request from its spec to a cache entry.
///
/// Fetching happens outside the gate; only decode, transform and encode hold a
/// slot. Concurrent misses on the same key are not coalesced: each fetches and
/// transforms independently and the last write wins.
pub struct Orchestrator {
    cache: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    pipeline: Arc<TransformPipeline>,
    gate: ConcurrencyGate,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        pipeline: Arc<TransformPipeline>,
        gate: ConcurrencyGate,
    ) -> Self {
        Self {
            cache,
            fetcher,
            pipeline,
            gate,
        }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Resolve `spec` to exactly one entry.
    ///
    /// Hits are returned as stored. A miss fetches, transforms and stores the
    /// outcome, failures included, before returning it. The only outcome that
    /// is not stored is a closed gate during shutdown.
    pub async fn serve(&self, spec: &ProcessingSpec) -> Served {
        let key = CacheKey::derive(spec);

        if let Some(entry) = self.cache.get(&key) {
            with_metrics(|m| m.record_cache_lookup(true));
            debug!(cache_key = %key, status = entry.status_code, "cache hit");
            return Served {
                entry,
                cache: CacheStatus::Hit,
            };
        }
        with_metrics(|m| m.record_cache_lookup(false));

        let entry = match self.resolve(&key, spec).await {
            Ok(entry) => entry,
            Err(Unstored(entry)) => {
                return Served {
                    entry: Arc::new(entry),
                    cache: CacheStatus::Miss,
                };
            }
        };

        let stored = self.cache.set(key, entry);
        let entries = self.cache.len();
        with_metrics(|m| m.set_cache_entries(entries));

        Served {
            entry: stored,
            cache: CacheStatus::Miss,
        }
    }

    async fn resolve(&self, key: &CacheKey, spec: &ProcessingSpec) -> Result<CacheEntry, Unstored> {
        let image = match self.fetch(key, &spec.url).await {
            Ok(image) => image,
            Err(err) => {
                let err = IpxError::from(err);
                return Ok(CacheEntry::failure(err.status_code(), err.to_string()));
            }
        };

        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                warn!(cache_key = %key, "transform gate closed");
                return Err(Unstored(CacheEntry::failure(err.status_code(), err.to_string())));
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        let owned_spec = spec.clone();
        let started = Instant::now();

        // The permit moves into the blocking task so it is released when the
        // work finishes, even if this future is dropped first.
        let outcome = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.run(image.bytes, image.format, &owned_spec)
        })
        .await
        .unwrap_or_else(|join_err| {
            Err(TransformError::Custom {
                reason: format!("transform task failed: {}", join_err),
            })
        });

        let elapsed = started.elapsed().as_secs_f64();
        Ok(match outcome {
            Ok(output) => {
                let label = if output.is_passthrough() { "passthrough" } else { "ok" };
                with_metrics(|m| m.record_transform(label, elapsed));
                debug!(
                    cache_key = %key,
                    content_type = %output.content_type,
                    size = output.payload.len(),
                    duration_ms = (elapsed * 1000.0) as u64,
                    "transform complete"
                );
                entry_from_output(output)
            }
            Err(err) => {
                with_metrics(|m| m.record_transform("error", elapsed));
                error!(cache_key = %key, url = %spec.url, error = %err, "transform failed");
                let err = IpxError::from(err);
                CacheEntry::failure(err.status_code(), err.to_string())
            }
        })
    }

    async fn fetch(&self, key: &CacheKey, url: &str) -> Result<FetchedImage, FetchError> {
        let started = Instant::now();
        let result = self.fetcher.fetch(url).await;
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) if err.is_client_error() => {
                debug!(cache_key = %key, url, error = %err, "rejected image URL");
                "client_error"
            }
            Err(err @ FetchError::Exhausted { .. }) => {
                warn!(cache_key = %key, url, error = %err, "origin unreachable");
                "exhausted"
            }
            Err(err) => {
                warn!(
                    cache_key = %key,
                    url,
                    status = err.origin_status(),
                    error = %err,
                    "origin fetch failed"
                );
                "origin_error"
            }
        };
        with_metrics(|m| m.record_fetch(outcome, elapsed));
        result
    }
}

/// An outcome returned to the caller without being cached.
struct Unstored(CacheEntry);

fn entry_from_output(output: TransformOutput) -> CacheEntry {
    if output.is_passthrough() {
        CacheEntry::passthrough(output.payload)
    } else {
        CacheEntry::success(output.content_type, output.payload)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache_entries", &self.cache.len())
            .field("gate_capacity", &self.gate.capacity())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
