//! ipxpress fetch - origin image retrieval
//!
//! [`Fetcher`] is the seam the orchestrator depends on; [`HttpFetcher`] is the
//! production implementation. Transient network failures are retried with a
//! linear backoff, while client errors (bad URL, unsupported scheme) and
//! origin HTTP errors are reported immediately.

use async_trait::async_trait;
use bytes::Bytes;
use ipxpress_core::{FetchError, Format};

mod config;
mod http;

pub use config::{FetchConfig, DEFAULT_USER_AGENT};
pub use http::HttpFetcher;

/// Raw origin bytes plus the format sniffed from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub format: Option<Format>,
}

impl FetchedImage {
    pub fn new(bytes: Bytes) -> Self {
        let format = Format::detect(&bytes);
        Self { bytes, format }
    }
}

/// Retrieves source bytes for a URL.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`.
    ///
    /// # Errors
    /// * `InvalidUrl` / `UnsupportedScheme` - the URL itself is unusable
    /// * `OriginStatus` - the origin answered with a non-success status
    /// * `TooLarge` - the body exceeds the configured limit
    /// * `Exhausted` - every attempt failed with a transient error
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}
