use axum::{Json, extract::State, response::IntoResponse};
use backend_manager::ConnectivityState;

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backends = state.registry.list().await;
    let connected = backends
        .iter()
        .filter(|b| b.connectivity == ConnectivityState::Connected)
        .count() as u64;
    let metrics = state.metrics.snapshot();

    // Degraded while any registered backend is down; error counters are
    // cumulative and live under /metrics
    let status = if connected == backends.len() as u64 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        backends: metrics::BackendHealth {
            total: backends.len() as u64,
            connected,
        },
        clients: state.hub.len().await as u64,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness check - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
