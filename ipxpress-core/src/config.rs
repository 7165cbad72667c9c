//! Shared configuration primitives.
//!
//! Every component reads its settings from `IPXPRESS_*` environment variables
//! with parse-or-default semantics, then validates the result.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Read `name` from the environment, falling back to `default` when unset or unparseable.
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read an optional value; unset or unparseable yields `None`.
pub fn env_opt<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Read a whole number of seconds as a [`Duration`].
pub fn env_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(name, default_secs))
}

/// Read a whole number of milliseconds as a [`Duration`].
pub fn env_millis(name: &str, default_millis: u64) -> Duration {
    Duration::from_millis(env_or(name, default_millis))
}

/// Reject a zero duration for `field`.
pub fn require_positive_duration(field: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: format!("{:?}", value),
            reason: format!("{} must be positive", field),
        });
    }
    Ok(())
}

/// Reject a zero count for `field`.
pub fn require_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("{} must be greater than 0", field),
        });
    }
    Ok(())
}

/// Retry policy for transient origin failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff grows linearly by this step per failed attempt.
    pub backoff_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(200),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("max_attempts", u64::from(self.max_attempts))
    }
}
