//! ipxpress API - HTTP image delivery
//!
//! Wires the cache, fetcher and transform pipeline behind an axum router.
//! [`Orchestrator`] owns the per-request lifecycle and [`ConcurrencyGate`]
//! bounds how many transforms run at once.

pub mod config;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, LogFormat, DEFAULT_PROCESSING_LIMIT};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use gate::{ConcurrencyGate, GatePermit};
pub use orchestrator::{CacheStatus, Orchestrator, Served};
pub use routes::create_router;
pub use state::AppState;
