//! reqwest-backed origin fetcher with per-host limits and transient retry.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use ipxpress_core::{ConfigError, FetchError};
use reqwest::{Client, Url};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::{FetchedImage, Fetcher};

/// Outcome of a single attempt.
enum AttemptError {
    /// Not worth retrying: the origin answered, or the body is too large.
    Fatal(FetchError),
    /// Network-level failure that may succeed on a later attempt.
    Transient(String),
}

/// Per-host slot. Dropping it releases the permit and forgets the host once
/// nobody else holds or awaits its semaphore.
struct HostSlot<'a> {
    permit: Option<OwnedSemaphorePermit>,
    host: String,
    limits: &'a DashMap<String, Arc<Semaphore>>,
}

impl Drop for HostSlot<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        // Clones are taken under the shard lock, so a count of one means the
        // map holds the only reference.
        self.limits.remove_if(&self.host, |_, semaphore| Arc::strong_count(semaphore) == 1);
    }
}

/// Origin fetcher built on a pooled reqwest client.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    host_limits: DashMap<String, Arc<Semaphore>>,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        // reqwest's connect timeout spans both TCP connect and TLS handshake.
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout + config.tls_timeout)
            .tcp_keepalive(Some(config.keepalive))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::BuildFailed {
                component: "http client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            config,
            host_limits: DashMap::new(),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn validate_url(raw: &str) -> Result<Url, FetchError> {
        let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FetchError::UnsupportedScheme {
                    scheme: other.to_string(),
                })
            }
        }
        if url.host_str().is_none() {
            return Err(FetchError::InvalidUrl {
                reason: "missing host".to_string(),
            });
        }
        Ok(url)
    }

    /// Hosts with a fetch in flight or waiting.
    pub fn tracked_hosts(&self) -> usize {
        self.host_limits.len()
    }

    async fn acquire_host_slot(&self, url: &Url) -> Result<HostSlot<'_>, FetchError> {
        let host = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        );
        let semaphore = self
            .host_limits
            .entry(host.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_conns_per_host)))
            .clone();
        let mut slot = HostSlot {
            permit: None,
            host,
            limits: &self.host_limits,
        };
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|e| FetchError::Network {
                reason: format!("host limiter closed: {}", e),
            })?;
        slot.permit = Some(permit);
        Ok(slot)
    }

    async fn attempt(&self, url: &Url) -> Result<Bytes, AttemptError> {
        let _slot = self.acquire_host_slot(url).await.map_err(AttemptError::Fatal)?;

        let send = self.client.get(url.clone()).send();
        let mut response = match tokio::time::timeout(self.config.header_timeout, send).await {
            Err(_) => {
                return Err(AttemptError::Transient(
                    "timed out waiting for response headers".to_string(),
                ))
            }
            Ok(Err(e)) => return Err(classify(e)),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Fatal(FetchError::OriginStatus {
                status: status.as_u16(),
            }));
        }

        let limit = self.config.max_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(AttemptError::Fatal(FetchError::TooLarge { limit }));
        }

        let mut body = BytesMut::with_capacity(
            response
                .content_length()
                .map(|len| len as usize)
                .unwrap_or(64 * 1024),
        );
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if body.len() as u64 + chunk.len() as u64 > limit {
                return Err(AttemptError::Fatal(FetchError::TooLarge { limit }));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

fn classify(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() || err.is_connect() || err.is_body() {
        AttemptError::Transient(err.to_string())
    } else {
        AttemptError::Fatal(FetchError::Network {
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, raw_url: &str) -> Result<FetchedImage, FetchError> {
        let url = Self::validate_url(raw_url)?;
        let max_attempts = self.config.retry.max_attempts.max(1);
        let started = Instant::now();
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(&url).await {
                Ok(bytes) => {
                    debug!(
                        url = %url,
                        attempt,
                        size = bytes.len(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "fetched origin image"
                    );
                    return Ok(FetchedImage::new(bytes));
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient(reason)) => {
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts,
                        reason = %reason,
                        "transient fetch failure"
                    );
                    last_reason = reason;
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry.backoff_for(attempt)).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts: max_attempts,
            reason: last_reason,
        })
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.config.timeout)
            .field("max_attempts", &self.config.retry.max_attempts)
            .field("hosts", &self.host_limits.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_schemes() {
        assert!(HttpFetcher::validate_url("https://example.com/a.png").is_ok());
        assert!(HttpFetcher::validate_url("http://example.com/a.png").is_ok());
        assert_eq!(
            HttpFetcher::validate_url("ftp://example.com/a.png").unwrap_err(),
            FetchError::UnsupportedScheme {
                scheme: "ftp".to_string()
            }
        );
        assert!(matches!(
            HttpFetcher::validate_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_debug_is_compact() {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let rendered = format!("{:?}", fetcher);
        assert!(rendered.contains("HttpFetcher"));
        assert!(rendered.contains("max_attempts"));
    }
}
