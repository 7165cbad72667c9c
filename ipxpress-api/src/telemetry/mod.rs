//! ipxpress Telemetry - Observability Infrastructure
//!
//! Structured logging via `tracing` and Prometheus metrics for the HTTP layer.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, with_metrics, IpxMetrics, METRICS};
pub use middleware::{observability_middleware, REQUEST_ID_HEADER};
pub use tracer::{init_tracing, TelemetryConfig};
