//! Transform configuration.

use ipxpress_core::{env_or, require_positive, ConfigError};

/// Largest output canvas, in pixels, any built-in step may produce.
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 100_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Upper bound on `width * height` after resize, crop padding or extend.
    pub max_output_pixels: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }
}

impl TransformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the environment.
    ///
    /// - `IPXPRESS_MAX_OUTPUT_PIXELS` (default: 100000000)
    pub fn from_env() -> Self {
        Self {
            max_output_pixels: env_or("IPXPRESS_MAX_OUTPUT_PIXELS", DEFAULT_MAX_OUTPUT_PIXELS),
        }
    }

    pub fn with_max_output_pixels(mut self, max_output_pixels: u64) -> Self {
        self.max_output_pixels = max_output_pixels;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("max_output_pixels", self.max_output_pixels)
    }
}
