use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::controller::ProxyController;
use crate::hub::ClientHub;
use crate::metrics::ServerMetrics;

use super::protocol::ClientCommand;

/// Serve one client until it disconnects.
///
/// Commands are handled one at a time so a client's commands reach each
/// backend in the order they were sent.
pub async fn handle_client(
    socket: WebSocket,
    hub: Arc<ClientHub>,
    controller: Arc<ProxyController>,
    metrics: Arc<ServerMetrics>,
    send_channel_capacity: usize,
) {
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(send_channel_capacity);
    let session = hub.attach(tx).await;
    info!("WebSocket connection accepted as {}", session);

    // Task to send messages to WebSocket
    let sender_task = async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to handle incoming messages
    let metrics_input = metrics.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let cmd = match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            warn!("Ignoring malformed message from {}: {}", session, e);
                            metrics_input.websocket_error();
                            continue;
                        }
                    };
                    let backend = match cmd.backend_id() {
                        Ok(id) => id,
                        Err(e) => {
                            warn!("Ignoring command from {}: {}", session, e);
                            metrics_input.websocket_error();
                            continue;
                        }
                    };
                    let ack = controller
                        .handle_command(session, backend, &cmd.command, cmd.credential())
                        .await;
                    debug!("{} command ack: {:?}", session, ack);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error on {}: {}", session, e);
                    metrics_input.websocket_error();
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => {},
        _ = input_task => {},
    }

    hub.detach(session).await;
    metrics.connection_closed();
    info!("WebSocket connection {} closed", session);
}
