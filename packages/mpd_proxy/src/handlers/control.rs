use axum::{Json, extract::State, http::StatusCode, response::{IntoResponse, Response}};
use backend_manager::{BackendId, BackendSnapshot};
use serde::Deserialize;

use crate::AppState;
use crate::controller::DestroyOutcome;
use crate::hub::SessionInfo;

/// Port as a JSON number or a numeric string
#[derive(Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn resolve(&self) -> Option<u16> {
        match self {
            PortValue::Number(n) => Some(*n),
            PortValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateBackendRequest {
    host: String,
    port: PortValue,
    #[serde(default)]
    pass: Option<String>,
}

pub async fn create_backend(
    State(state): State<AppState>,
    Json(req): Json<CreateBackendRequest>,
) -> Response {
    let host = req.host.trim();
    let Some(port) = req.port.resolve() else {
        return (StatusCode::BAD_REQUEST, "port must be a number between 0 and 65535")
            .into_response();
    };
    if host.is_empty() {
        return (StatusCode::BAD_REQUEST, "host must not be empty").into_response();
    }

    let credential = req.pass.filter(|p| !p.is_empty());
    let ack = state
        .controller
        .create_backend(BackendId::new(host, port), credential)
        .await;
    Json(ack).into_response()
}

#[derive(Deserialize)]
pub struct DestroyBackendRequest {
    #[serde(rename = "connectionId")]
    connection_id: String,
}

/// Always succeeds: the removed backend's snapshot, or `{}` when there was
/// nothing to remove.
pub async fn destroy_backend(
    State(state): State<AppState>,
    Json(req): Json<DestroyBackendRequest>,
) -> Response {
    let Ok(id) = req.connection_id.parse::<BackendId>() else {
        tracing::debug!("Destroy for unparseable id '{}'", req.connection_id);
        return Json(serde_json::json!({})).into_response();
    };

    match state.controller.handle_destroy(&id).await {
        DestroyOutcome::Removed(snapshot) => Json(snapshot).into_response(),
        DestroyOutcome::NotFound => Json(serde_json::json!({})).into_response(),
    }
}

pub async fn list_backends(State(state): State<AppState>) -> Json<Vec<BackendSnapshot>> {
    Json(state.registry.list().await)
}

pub async fn list_clients(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.hub.list().await)
}
