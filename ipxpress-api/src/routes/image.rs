//! Image delivery handler.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use ipxpress_core::ProcessingSpec;

use crate::error::ApiResult;
use crate::orchestrator::{Orchestrator, Served};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Cache-Control for origin bytes returned verbatim.
pub const PASSTHROUGH_CACHE_CONTROL: &str = "public, max-age=31536000";
pub const TRANSFORMED_CACHE_CONTROL: &str = "public, max-age=604800";

/// GET / and /ipx
///
/// Query parameters are parsed into a [`ProcessingSpec`]; a missing or
/// malformed parameter answers 400 before anything is fetched.
pub async fn serve_image(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let spec = ProcessingSpec::from_query(params).map_err(|e| {
        tracing::debug!(error = %e, "rejected request");
        e
    })?;
    let served = orchestrator.serve(&spec).await;
    Ok(render(served))
}

/// Turn a served entry into the HTTP response.
pub fn render(served: Served) -> Response {
    let cache_status = HeaderValue::from_static(served.cache.as_str());
    let entry = served.entry;

    if let Some(message) = &entry.error {
        let status =
            StatusCode::from_u16(entry.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
                (X_CACHE, cache_status),
            ],
            message.clone(),
        )
            .into_response();
    }

    let cache_control = if entry.is_passthrough() {
        PASSTHROUGH_CACHE_CONTROL
    } else {
        TRANSFORMED_CACHE_CONTROL
    };
    let content_type = HeaderValue::from_str(&entry.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let status = StatusCode::from_u16(entry.status_code).unwrap_or(StatusCode::OK);

    (
        status,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(entry.payload.len())),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
            (X_CACHE, cache_status),
        ],
        entry.payload.clone(),
    )
        .into_response()
}
