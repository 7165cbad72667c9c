//! Prometheus Metrics Definitions
//!
//! Registers every ipxpress metric once and exposes the /metrics handler.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec,
    CounterVec, Encoder, Gauge, Histogram, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Stage latency buckets (seconds)
const STAGE_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 20.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<IpxMetrics>> = Lazy::new(IpxMetrics::new);

#[derive(Clone)]
pub struct IpxMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// labels: result (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// labels: outcome (ok/client_error/origin_error/exhausted)
    pub fetch_total: CounterVec,

    pub fetch_duration_seconds: Histogram,

    /// labels: outcome (ok/passthrough/error)
    pub transform_total: CounterVec,

    pub transform_duration_seconds: Histogram,

    /// Transform slots currently held
    pub gate_in_flight: Gauge,

    pub cache_entries: Gauge,
}

fn registration(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl IpxMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "ipxpress_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "ipxpress_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration("http_request_duration_seconds", e))?,

            cache_lookups_total: register_counter_vec!(
                "ipxpress_cache_lookups_total",
                "Result cache lookups",
                &["result"]
            )
            .map_err(|e| registration("cache_lookups_total", e))?,

            fetch_total: register_counter_vec!(
                "ipxpress_fetch_total",
                "Origin fetches by outcome",
                &["outcome"]
            )
            .map_err(|e| registration("fetch_total", e))?,

            fetch_duration_seconds: register_histogram!(
                "ipxpress_fetch_duration_seconds",
                "Origin fetch duration in seconds, retries included",
                STAGE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration("fetch_duration_seconds", e))?,

            transform_total: register_counter_vec!(
                "ipxpress_transform_total",
                "Transform stage runs by outcome",
                &["outcome"]
            )
            .map_err(|e| registration("transform_total", e))?,

            transform_duration_seconds: register_histogram!(
                "ipxpress_transform_duration_seconds",
                "Transform stage duration in seconds, gate wait excluded",
                STAGE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration("transform_duration_seconds", e))?,

            gate_in_flight: register_gauge!(
                "ipxpress_gate_in_flight",
                "Transform slots currently held"
            )
            .map_err(|e| registration("gate_in_flight", e))?,

            cache_entries: register_gauge!(
                "ipxpress_cache_entries",
                "Entries currently held by the result cache"
            )
            .map_err(|e| registration("cache_entries", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_fetch(&self, outcome: &str, duration_secs: f64) {
        self.fetch_total.with_label_values(&[outcome]).inc();
        self.fetch_duration_seconds.observe(duration_secs);
    }

    pub fn record_transform(&self, outcome: &str, duration_secs: f64) {
        self.transform_total.with_label_values(&[outcome]).inc();
        self.transform_duration_seconds.observe(duration_secs);
    }

    pub fn set_gate_in_flight(&self, count: usize) {
        self.gate_in_flight.set(count as f64);
    }

    pub fn set_cache_entries(&self, count: usize) {
        self.cache_entries.set(count as f64);
    }
}

/// Run `f` against the global metrics if they registered successfully.
pub fn with_metrics(f: impl FnOnce(&IpxMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_stage_outcomes() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);
        metrics.record_fetch("origin_error", 0.02);
        metrics.record_transform("ok", 0.15);
        assert!(
            metrics
                .cache_lookups_total
                .with_label_values(&["hit"])
                .get()
                >= 1.0
        );
        Ok(())
    }

    #[test]
    fn test_gauges() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.set_cache_entries(12);
        metrics.set_gate_in_flight(3);
        // Other tests in this binary update the same gauges.
        assert!(metrics.gate_in_flight.get() >= 0.0);
        Ok(())
    }
}
