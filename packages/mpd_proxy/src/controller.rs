//! Glue between clients, the hub and the backend registry.

use backend_manager::{
    BackendEvent, BackendHandle, BackendId, BackendRegistry, BackendSnapshot, Ensured,
};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::hub::{ClientHub, SessionId};
use crate::metrics::ServerMetrics;

/// Stand-in command for replies that arrive with nothing pending
const UNSOLICITED: &str = "(unsolicited)";

/// Result of forwarding one client command
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CommandAck {
    pub backend: String,
    pub created: bool,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body of `POST /api/create`
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CreateAck {
    pub msg: String,
    pub id: String,
    pub created: bool,
}

#[derive(Clone, Debug)]
pub enum DestroyOutcome {
    Removed(BackendSnapshot),
    NotFound,
}

pub struct ProxyController {
    registry: Arc<BackendRegistry>,
    hub: Arc<ClientHub>,
    metrics: Arc<ServerMetrics>,
    max_pending: Option<usize>,
}

impl ProxyController {
    pub fn new(
        registry: Arc<BackendRegistry>,
        hub: Arc<ClientHub>,
        metrics: Arc<ServerMetrics>,
        max_pending: Option<usize>,
    ) -> Self {
        Self {
            registry,
            hub,
            metrics,
            max_pending,
        }
    }

    /// Route a client command to its backend, creating the connection if
    /// needed. Replies reach the client through the broadcast, not the ack.
    pub async fn handle_command(
        &self,
        session: SessionId,
        backend: BackendId,
        command: &str,
        credential: Option<String>,
    ) -> CommandAck {
        self.metrics.command_received();
        debug!("{} -> [{}] {}", session, backend, command.trim_end());

        // Routing to a known backend only needs the read lock
        let (handle, created) = match self.registry.get(&backend).await {
            Some(handle) => (handle, false),
            None => {
                let ensured = self.ensure(backend.clone(), credential).await;
                let created = ensured.is_created();
                (ensured.into_handle(), created)
            }
        };

        match handle.send(command).await {
            Ok(_) => CommandAck {
                backend: backend.to_string(),
                created,
                sent: true,
                error: None,
            },
            Err(e) => {
                warn!("Command from {} to {} failed: {}", session, backend, e);
                self.metrics.backend_error();
                CommandAck {
                    backend: backend.to_string(),
                    created,
                    sent: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Make sure a connection to `backend` exists and is connecting.
    pub async fn create_backend(&self, backend: BackendId, credential: Option<String>) -> CreateAck {
        let ensured = self.ensure(backend.clone(), credential).await;
        CreateAck {
            msg: "done".to_string(),
            id: backend.to_string(),
            created: ensured.is_created(),
        }
    }

    /// Close and forget a backend. Clients are not notified.
    pub async fn handle_destroy(&self, backend: &BackendId) -> DestroyOutcome {
        match self.registry.remove(backend).await {
            Some(handle) => {
                self.metrics.backend_destroyed();
                info!("MPD destroyed [{}]", backend);
                DestroyOutcome::Removed(handle.snapshot().await)
            }
            None => DestroyOutcome::NotFound,
        }
    }

    async fn ensure(&self, backend: BackendId, credential: Option<String>) -> Ensured {
        let hub = self.hub.clone();
        let metrics = self.metrics.clone();
        let max_pending = self.max_pending;

        let ensured = self
            .registry
            .ensure_with(backend, credential, move |handle| {
                spawn_forwarder(handle, handle.subscribe(), hub, metrics);
                spawn_reply_log(handle, max_pending);
            })
            .await;
        if ensured.is_created() {
            self.metrics.backend_created();
        }
        ensured
    }
}

/// Push every event of `handle` to all clients, in order, until the backend
/// is shut down.
fn spawn_forwarder(
    handle: &BackendHandle,
    mut events: broadcast::Receiver<BackendEvent>,
    hub: Arc<ClientHub>,
    metrics: Arc<ServerMetrics>,
) {
    let handle = handle.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                event = events.recv() => event,
                _ = handle.cancelled() => break,
            };
            match event {
                Ok(event) => {
                    if let BackendEvent::Closed { id, reason } = &event {
                        info!("MPD Connection [{}] Closed ({})", id, reason);
                    }
                    let report = hub.broadcast(&event.client_text()).await;
                    metrics.messages_broadcast(report.delivered, report.dropped);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Forwarder for {} lagged by {} events", handle.id(), n);
                    metrics.messages_broadcast(0, n as usize);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Forwarder for {} stopped", handle.id());
    });
}

/// Log each reply next to the command it answers; replies with nothing
/// pending are skipped. Re-subscribes after every transport close since a
/// correlated stream covers one session.
fn spawn_reply_log(handle: &BackendHandle, max_pending: Option<usize>) {
    let handle = handle.clone();
    tokio::spawn(async move {
        while !handle.is_shut_down() {
            let mut paired = handle.correlated(UNSOLICITED, |p| p.command != UNSOLICITED);
            if let Some(max) = max_pending {
                paired = paired.with_capacity(max);
            }
            loop {
                let next = tokio::select! {
                    next = paired.next() => next,
                    _ = handle.cancelled() => return,
                };
                match next {
                    Some(Ok(pair)) => debug!(
                        "[{}] {} => {}",
                        handle.id(),
                        pair.command,
                        pair.reply.lines().last().unwrap_or_default()
                    ),
                    Some(Err(e)) => {
                        debug!("Reply log for {} restarting: {}", handle.id(), e);
                        break;
                    }
                    None => break,
                }
            }
        }
    });
}
