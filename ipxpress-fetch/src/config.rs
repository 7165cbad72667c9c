//! Fetcher configuration.

use std::time::Duration;

use ipxpress_core::{
    env_millis, env_or, env_secs, require_positive, require_positive_duration, ConfigError,
    RetryConfig,
};

/// User-Agent sent to origins. Some CDNs refuse requests without a browser-like agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Timeouts, pool sizing and retry policy for origin fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Upper bound on a whole attempt, body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Time allowed between sending the request and receiving response headers.
    pub header_timeout: Duration,
    pub tls_timeout: Duration,
    pub keepalive: Duration,
    pub retry: RetryConfig,
    /// Largest accepted body in bytes.
    pub max_bytes: u64,
    /// In-flight fetches allowed per origin host.
    pub max_conns_per_host: usize,
    pub max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(5),
            header_timeout: Duration::from_secs(10),
            tls_timeout: Duration::from_secs(10),
            keepalive: Duration::from_secs(30),
            retry: RetryConfig::default(),
            max_bytes: 32 * 1024 * 1024,
            max_conns_per_host: 256,
            max_idle_per_host: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Load from `IPXPRESS_FETCH_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: env_secs("IPXPRESS_FETCH_TIMEOUT_SECS", 20),
            connect_timeout: env_secs("IPXPRESS_FETCH_CONNECT_TIMEOUT_SECS", 5),
            header_timeout: env_secs("IPXPRESS_FETCH_HEADER_TIMEOUT_SECS", 10),
            tls_timeout: env_secs("IPXPRESS_FETCH_TLS_TIMEOUT_SECS", 10),
            keepalive: defaults.keepalive,
            retry: RetryConfig::new(
                env_or("IPXPRESS_FETCH_MAX_ATTEMPTS", 3),
                env_millis("IPXPRESS_FETCH_BACKOFF_MS", 200),
            ),
            max_bytes: env_or("IPXPRESS_FETCH_MAX_BYTES", defaults.max_bytes),
            max_conns_per_host: env_or("IPXPRESS_FETCH_MAX_CONNS_PER_HOST", 256),
            max_idle_per_host: env_or("IPXPRESS_FETCH_MAX_IDLE_PER_HOST", 100),
            user_agent: defaults.user_agent,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_max_conns_per_host(mut self, max: usize) -> Self {
        self.max_conns_per_host = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_duration("fetch_timeout", self.timeout)?;
        require_positive_duration("fetch_connect_timeout", self.connect_timeout)?;
        require_positive_duration("fetch_header_timeout", self.header_timeout)?;
        require_positive_duration("fetch_tls_timeout", self.tls_timeout)?;
        require_positive("fetch_max_bytes", self.max_bytes)?;
        require_positive("fetch_max_conns_per_host", self.max_conns_per_host as u64)?;
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_idle_per_host, 100);
        assert_eq!(config.max_conns_per_host, 256);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = FetchConfig::default().with_retry(RetryConfig::new(0, Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = FetchConfig::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
