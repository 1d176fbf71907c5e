use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Shared WebSocket endpoint for every backend
pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let controller = state.controller.clone();
    let metrics = state.metrics.clone();
    let capacity = state.config.websocket.send_channel_capacity;

    ws.protocols([state.config.websocket.protocol.clone()])
        .on_upgrade(move |socket| ws::handle_client(socket, hub, controller, metrics, capacity))
}
