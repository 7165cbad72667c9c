//! Error types for ipxpress operations

use thiserror::Error;

/// Request validation errors (ClientInputError).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing image URL")]
    MissingUrl,

    #[error("invalid value for {param}: {value} - {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },
}

/// Origin fetch errors.
///
/// Client-side variants (`InvalidUrl`, `UnsupportedScheme`) are never retried.
/// `Exhausted` is produced only after the fetcher's transient-retry budget is spent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid image URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("image URL must use http or https")]
    UnsupportedScheme { scheme: String },

    #[error("image fetch failed with status {status}")]
    OriginStatus { status: u16 },

    #[error("image exceeds maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to fetch image after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },

    #[error("failed to fetch image: {reason}")]
    Network { reason: String },
}

impl FetchError {
    /// True for errors caused by the request itself rather than the origin.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidUrl { .. } | FetchError::UnsupportedScheme { .. }
        )
    }

    /// Status reported by the origin, when it answered at all.
    pub fn origin_status(&self) -> Option<u16> {
        match self {
            FetchError::OriginStatus { status } => Some(*status),
            _ => None,
        }
    }
}

/// Decode, operation and encode failures raised by the transform stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("decode: {reason}")]
    Decode { reason: String },

    #[error("{operation}: {reason}")]
    Operation { operation: String, reason: String },

    #[error("encode {format}: {reason}")]
    Encode { format: String, reason: String },

    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<TransformError>,
    },

    #[error("{reason}")]
    Custom { reason: String },
}

impl TransformError {
    /// Wrap this error with the identity of the pipeline step that raised it.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        TransformError::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Name of the step this error was raised in, if it has been wrapped.
    pub fn step(&self) -> Option<&str> {
        match self {
            TransformError::Step { step, .. } => Some(step),
            _ => None,
        }
    }

    pub fn operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        TransformError::Operation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to build {component}: {reason}")]
    BuildFailed { component: String, reason: String },
}

/// Master error type for all ipxpress errors.
#[derive(Debug, Clone, Error)]
pub enum IpxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("transform gate closed")]
    GateClosed,
}

impl IpxError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            IpxError::Validation(_) | IpxError::Fetch(_) => 400,
            IpxError::Transform(_) | IpxError::Config(_) => 500,
            IpxError::GateClosed => 503,
        }
    }
}

/// Result type alias for ipxpress operations.
pub type IpxResult<T> = Result<T, IpxError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_origin_status() {
        let err = FetchError::OriginStatus { status: 404 };
        assert_eq!(err.to_string(), "image fetch failed with status 404");
        assert_eq!(err.origin_status(), Some(404));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_fetch_error_client_variants() {
        let err = FetchError::UnsupportedScheme {
            scheme: "ftp".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "image URL must use http or https");
        assert_eq!(err.origin_status(), None);
    }

    #[test]
    fn test_transform_error_step_wrapping() {
        let err = TransformError::operation("resize", "zero width").in_step("resize");
        assert_eq!(err.step(), Some("resize"));
        let msg = err.to_string();
        assert!(msg.contains("step 'resize' failed"));
        assert!(msg.contains("zero width"));
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(IpxError::from(ValidationError::MissingUrl).status_code(), 400);
        assert_eq!(
            IpxError::from(FetchError::OriginStatus { status: 503 }).status_code(),
            400
        );
        assert_eq!(
            IpxError::from(TransformError::Decode {
                reason: "bad magic".to_string()
            })
            .status_code(),
            500
        );
        assert_eq!(IpxError::GateClosed.status_code(), 503);
    }

    #[test]
    fn test_transparent_display() {
        let err = IpxError::from(ValidationError::MissingUrl);
        assert_eq!(err.to_string(), "missing image URL");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "processing_limit".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("processing_limit"));
        assert!(msg.contains("must be positive"));
    }
}
