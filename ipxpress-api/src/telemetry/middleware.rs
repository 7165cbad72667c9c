//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Every request gets an `http_request` span carrying a UUIDv7 request id,
//! which is echoed back in the `x-request-id` response header.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::metrics::with_metrics;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Collapse the path to a bounded label set for Prometheus.
fn normalize_path(path: &str) -> &'static str {
    match path.trim_end_matches('/') {
        "" => "/",
        "/ipx" => "/ipx",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

/// Request id from the incoming header, or a fresh UUIDv7.
fn request_id(request: &Request) -> String {
    request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string())
}

pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = normalize_path(&path);
    let request_id = request_id(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = route,
        request_id = %request_id,
    );

    let mut response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    with_metrics(|m| {
        m.record_http_request(method.as_str(), route, status.as_u16(), duration.as_secs_f64())
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        request_id = %request_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_known_routes() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/ipx"), "/ipx");
        assert_eq!(normalize_path("/ipx/"), "/ipx");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_path_unknown_collapses() {
        assert_eq!(normalize_path("/wp-admin/login.php"), "other");
        assert_eq!(normalize_path("/ipx/extra"), "other");
    }

    #[test]
    fn test_request_id_reused_or_generated() {
        let req = Request::builder()
            .uri("/")
            .header("x-request-id", "abc-123")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(request_id(&req), "abc-123");

        let req = Request::builder()
            .uri("/")
            .body(axum::body::Body::empty())
            .unwrap();
        let generated = request_id(&req);
        assert!(Uuid::parse_str(&generated).is_ok());
    }
}
