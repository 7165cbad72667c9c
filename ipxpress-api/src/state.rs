//! Shared application state for Axum routers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl FromRef<AppState> for Arc<Orchestrator> {
    fn from_ref(state: &AppState) -> Self {
        state.orchestrator.clone()
    }
}
