//! Error Types for the ipxpress HTTP surface
//!
//! - `ErrorCode` categorises failures and maps them to HTTP status codes
//! - `ApiError` carries a code and the message written to the client
//!
//! Error responses are plain text: the body is the message, nothing else.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use ipxpress_core::{ConfigError, FetchError, IpxError, TransformError, ValidationError};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing or malformed request parameter
    InvalidInput,

    /// Origin unreachable, refused, or answered with a non-success status
    OriginFetchFailed,

    /// Decode, transform or encode failure
    TransformFailed,

    /// Transform gate closed during shutdown
    ServiceUnavailable,

    /// Startup or configuration failure
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::OriginFetchFailed => StatusCode::BAD_REQUEST,
            ErrorCode::TransformFailed | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,

    /// Text written as the response body.
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError::new(ErrorCode::OriginFetchFailed, err.to_string())
    }
}

impl From<TransformError> for ApiError {
    fn from(err: TransformError) -> Self {
        ApiError::new(ErrorCode::TransformFailed, err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

impl From<IpxError> for ApiError {
    fn from(err: IpxError) -> Self {
        match err {
            IpxError::Validation(e) => e.into(),
            IpxError::Fetch(e) => e.into(),
            IpxError::Transform(e) => e.into(),
            IpxError::Config(e) => e.into(),
            IpxError::GateClosed => ApiError::service_unavailable(err.to_string()),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OriginFetchFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::TransformFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_conversions_agree_with_core_taxonomy() {
        let cases: Vec<IpxError> = vec![
            ValidationError::MissingUrl.into(),
            FetchError::OriginStatus { status: 404 }.into(),
            TransformError::Decode {
                reason: "bad magic".to_string(),
            }
            .into(),
            IpxError::GateClosed,
        ];
        for err in cases {
            let expected = err.status_code();
            let api: ApiError = err.into();
            assert_eq!(api.status_code().as_u16(), expected);
        }
    }

    #[test]
    fn test_message_is_the_plain_error_text() {
        let api: ApiError = FetchError::OriginStatus { status: 404 }.into();
        assert_eq!(api.message, "image fetch failed with status 404");
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::internal_error("bind failed");
        let display = format!("{}", err);
        assert!(display.contains("InternalError"));
        assert!(display.contains("bind failed"));
    }
}
