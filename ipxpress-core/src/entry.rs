//! Cached outcome of processing one spec, success or failure.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::PASSTHROUGH_CONTENT_TYPE;

/// Immutable record of a processing outcome.
///
/// Success entries carry a 2xx status, a payload and no error. Failure entries
/// carry a non-2xx status, an error message and an empty payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub content_type: String,
    #[serde(skip)]
    pub payload: Bytes,
    pub status_code: u16,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// A transformed image.
    pub fn success(content_type: impl Into<String>, payload: Bytes) -> Self {
        Self {
            content_type: content_type.into(),
            payload,
            status_code: 200,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Origin bytes returned verbatim.
    pub fn passthrough(payload: Bytes) -> Self {
        Self::success(PASSTHROUGH_CONTENT_TYPE, payload)
    }

    /// A failed outcome to be replayed until it expires.
    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            content_type: "text/plain; charset=utf-8".to_string(),
            payload: Bytes::new(),
            status_code,
            error: Some(message.into()),
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_passthrough(&self) -> bool {
        !self.is_error() && self.content_type == PASSTHROUGH_CONTENT_TYPE
    }

    /// Copy of this entry stamped with the current time.
    pub fn restamped(mut self) -> Self {
        self.created_at = Utc::now();
        self
    }
}
