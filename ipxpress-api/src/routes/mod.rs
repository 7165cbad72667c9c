//! HTTP Routes
//!
//! - `/`, `/ipx`, `/ipx/` - image delivery
//! - `/health` - liveness
//! - `/metrics` - Prometheus scrape

pub mod health;
pub mod image;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Build the full router.
///
/// Execution order: CORS -> Observability -> Handler
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .route("/", get(image::serve_image))
        .route("/ipx", get(image::serve_image))
        .route("/ipx/", get(image::serve_image))
        .route("/health", get(health::health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(config))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Empty origin list allows every origin; otherwise exact and `*.domain`
/// matches only.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CACHE_CONTROL,
            image::X_CACHE,
            crate::telemetry::REQUEST_ID_HEADER,
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricted origins");
        let config = config.clone();
        cors.allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts| {
                origin
                    .to_str()
                    .map(|o| config.is_origin_allowed(o))
                    .unwrap_or(false)
            },
        ))
    }
}
