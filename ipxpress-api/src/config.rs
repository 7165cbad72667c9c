//! API Configuration Module
//!
//! Listen address, transform concurrency, CORS and log format. Loaded from
//! environment variables with defaults suitable for local use.

use std::net::SocketAddr;

use ipxpress_core::{env_opt, env_or, require_positive, ConfigError};

/// Default number of concurrent transform slots.
pub const DEFAULT_PROCESSING_LIMIT: usize = 256;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Parse `json` or `pretty`; anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_host: String,
    pub port: u16,

    /// Capacity of the transform gate.
    pub processing_limit: usize,

    /// Allowed CORS origins. Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            processing_limit: DEFAULT_PROCESSING_LIMIT,
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `IPXPRESS_BIND`: listen host (default: 0.0.0.0)
    /// - `PORT` or `IPXPRESS_PORT`: listen port (default: 8080)
    /// - `IPXPRESS_PROCESSING_LIMIT`: concurrent transforms (default: 256)
    /// - `IPXPRESS_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `IPXPRESS_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    /// - `IPXPRESS_LOG_FORMAT`: `json` or `pretty` (default: json)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("IPXPRESS_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port = env_opt::<u16>("PORT")
            .or_else(|| env_opt::<u16>("IPXPRESS_PORT"))
            .unwrap_or(defaults.port);

        let log_format = std::env::var("IPXPRESS_LOG_FORMAT")
            .ok()
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            bind_host: std::env::var("IPXPRESS_BIND").unwrap_or(defaults.bind_host),
            port,
            processing_limit: env_or("IPXPRESS_PROCESSING_LIMIT", DEFAULT_PROCESSING_LIMIT),
            cors_origins,
            cors_max_age_secs: env_or("IPXPRESS_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs),
            log_format,
        }
    }

    pub fn with_processing_limit(mut self, limit: usize) -> Self {
        self.processing_limit = limit;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("processing_limit", self.processing_limit as u64)
    }

    /// Resolve the listen address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "bind".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(domain) = origin
                    .strip_prefix("https://")
                    .or_else(|| origin.strip_prefix("http://"))
                {
                    return domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.processing_limit, 256);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_processing_limit_rejected() {
        let config = ApiConfig::default().with_processing_limit(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");

        let config = ApiConfig {
            bind_host: "not a host".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_origin_allowed() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.test"));

        let config = ApiConfig::default().with_cors_origins(vec![
            "https://cdn.example.com".to_string(),
            "*.images.example.com".to_string(),
        ]);
        assert!(config.is_origin_allowed("https://cdn.example.com"));
        assert!(config.is_origin_allowed("https://eu.images.example.com"));
        assert!(!config.is_origin_allowed("https://evil.test"));
        assert!(!config.is_origin_allowed("https://notimages.example.com"));
    }
}
