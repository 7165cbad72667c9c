//! Cache configuration.

use std::time::Duration;

use ipxpress_core::{env_opt, env_or, env_secs, require_positive, require_positive_duration};
use ipxpress_core::ConfigError;

/// Configuration for the result cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for successful outcomes.
    pub ttl: Duration,
    /// TTL for failed outcomes. `None` uses `ttl`.
    pub error_ttl: Option<Duration>,
    /// Maximum number of live entries.
    pub max_entries: usize,
    /// How often the janitor purges expired entries.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            error_ttl: None,
            max_entries: 5_000,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the environment.
    ///
    /// - `IPXPRESS_CACHE_TTL_SECS` (default: 30)
    /// - `IPXPRESS_ERROR_CACHE_TTL_SECS` (default: same as the TTL)
    /// - `IPXPRESS_CACHE_CAPACITY` (default: 5000)
    /// - `IPXPRESS_CLEANUP_INTERVAL_SECS` (default: 30)
    pub fn from_env() -> Self {
        Self {
            ttl: env_secs("IPXPRESS_CACHE_TTL_SECS", 30),
            error_ttl: env_opt::<u64>("IPXPRESS_ERROR_CACHE_TTL_SECS").map(Duration::from_secs),
            max_entries: env_or("IPXPRESS_CACHE_CAPACITY", 5_000),
            cleanup_interval: env_secs("IPXPRESS_CLEANUP_INTERVAL_SECS", 30),
        }
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set a separate TTL for failed outcomes.
    pub fn with_error_ttl(mut self, ttl: Duration) -> Self {
        self.error_ttl = Some(ttl);
        self
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// TTL applied to an entry, depending on whether it records a failure.
    pub fn ttl_for(&self, is_error: bool) -> Duration {
        if is_error {
            self.error_ttl.unwrap_or(self.ttl)
        } else {
            self.ttl
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_duration("cache_ttl", self.ttl)?;
        if let Some(error_ttl) = self.error_ttl {
            require_positive_duration("error_cache_ttl", error_ttl)?;
        }
        require_positive("cache_capacity", self.max_entries as u64)?;
        require_positive_duration("cleanup_interval", self.cleanup_interval)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(30));
        assert_eq!(config.max_entries, 5_000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_error_ttl_falls_back_to_ttl() {
        let config = CacheConfig::new().with_ttl(Duration::from_secs(10));
        assert_eq!(config.ttl_for(true), Duration::from_secs(10));

        let config = config.with_error_ttl(Duration::from_secs(2));
        assert_eq!(config.ttl_for(true), Duration::from_secs(2));
        assert_eq!(config.ttl_for(false), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(CacheConfig::new().with_max_entries(0).validate().is_err());
        assert!(CacheConfig::new().with_ttl(Duration::ZERO).validate().is_err());
        assert!(CacheConfig::new()
            .with_error_ttl(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CacheConfig::new()
            .with_cleanup_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
