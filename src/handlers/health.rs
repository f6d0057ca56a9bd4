use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub adapter: &'static str,
    pub tools: usize,
}

/// GET /health - Liveness check, no credentials required.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        adapter: state.config.adapter.name(),
        tools: state.dispatcher.registry().list_tools().len(),
    })
}
