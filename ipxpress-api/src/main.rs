//! ipxpress Server Entry Point
//!
//! Loads configuration, builds the cache, fetcher, pipeline and gate, and
//! starts the Axum HTTP server.

use std::sync::Arc;

use ipxpress_api::telemetry::{init_tracing, TelemetryConfig};
use ipxpress_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, ConcurrencyGate, Orchestrator,
};
use ipxpress_cache::{CacheConfig, CacheStore, Janitor, MemoryCacheStore};
use ipxpress_fetch::{FetchConfig, HttpFetcher};
use ipxpress_transform::{RasterEngine, TransformConfig, TransformPipeline};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let api_config = ApiConfig::from_env();
    init_tracing(&TelemetryConfig::default().with_log_format(api_config.log_format))?;
    api_config.validate()?;

    let cache_config = CacheConfig::from_env();
    let cleanup_interval = cache_config.cleanup_interval;
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(cache_config)?);
    let janitor = Janitor::spawn(Arc::clone(&cache), cleanup_interval);

    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from_env())?);
    let transform_config = TransformConfig::from_env();
    transform_config.validate()?;
    let pipeline = Arc::new(TransformPipeline::with_config(
        Arc::new(RasterEngine::new()),
        &transform_config,
    ));
    let gate = ConcurrencyGate::new(api_config.processing_limit)?;

    let orchestrator = Arc::new(Orchestrator::new(cache, fetcher, pipeline, gate.clone()));
    let app = create_router(AppState::new(orchestrator), &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, processing_limit = gate.capacity(), "Starting ipxpress server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    gate.close();
    janitor.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
