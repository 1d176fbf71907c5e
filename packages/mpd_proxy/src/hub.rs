//! Registry of attached WebSocket clients and fan-out of backend output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

/// Identifier of an attached client. Never reused within a hub.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

struct ClientSession {
    outbound: mpsc::Sender<String>,
    connected_at: DateTime<Utc>,
}

/// Diagnostic view of an attached client
#[derive(Clone, Debug, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub connected_at: String,
}

/// Outcome of one broadcast
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Sessions whose outbound channel was full; they miss this message
    pub dropped: usize,
    /// Sessions found closed and detached
    pub detached: usize,
}

pub struct ClientHub {
    sessions: RwLock<HashMap<SessionId, ClientSession>>,
    next_id: AtomicU64,
}

impl Default for ClientHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHub {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client. Messages for it are pushed onto `outbound`.
    pub async fn attach(&self, outbound: mpsc::Sender<String>) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sessions.write().await.insert(
            id,
            ClientSession {
                outbound,
                connected_at: Utc::now(),
            },
        );
        info!("{} attached", id);
        id
    }

    /// Remove a client. Returns false if it was not attached.
    pub async fn detach(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!("{} detached", id);
        }
        removed
    }

    /// Deliver `message` to every attached client.
    ///
    /// Never waits on a client: the read lock is held for the whole fan-out,
    /// so a concurrent detach lands either before or after it.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                match session.outbound.try_send(message.to_string()) {
                    Ok(()) => report.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("{} is not keeping up, dropping message", id);
                        report.dropped += 1;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!("{} channel closed during broadcast", id);
                        closed.push(*id);
                    }
                }
            }
        }

        for id in closed {
            if self.detach(id).await {
                report.detached += 1;
            }
        }

        debug!(
            "Broadcast to {} clients ({} dropped)",
            report.delivered, report.dropped
        );
        report
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut list: Vec<_> = sessions
            .iter()
            .map(|(id, s)| SessionInfo {
                id: *id,
                connected_at: s.connected_at.to_rfc3339(),
            })
            .collect();
        list.sort_by_key(|s| s.id);
        list
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
