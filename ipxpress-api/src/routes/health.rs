//! Liveness endpoint. Touches nothing on the processing path.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
