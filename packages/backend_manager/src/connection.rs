use chrono::{DateTime, Utc};
use correlator::{Correlated, Paired, correlate};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::framing::{ReplyFramer, decode_line};
use crate::id::BackendId;

/// Transport-level state of a backend connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

/// Whether the credential has been accepted. Only reachable while connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connectivity: ConnectivityState,
    pub auth: AuthState,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            connectivity: ConnectivityState::Disconnected,
            auth: AuthState::Unauthenticated,
        }
    }
}

/// Item of a backend's inbound stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    /// One complete reply (or notification), raw text as the backend sent it
    Message { id: BackendId, data: String },
    /// The transport closed or could not be opened
    Closed { id: BackendId, reason: String },
}

impl BackendEvent {
    pub fn backend_id(&self) -> &BackendId {
        match self {
            BackendEvent::Message { id, .. } | BackendEvent::Closed { id, .. } => id,
        }
    }

    /// Text delivered to WebSocket clients for this event.
    pub fn client_text(&self) -> String {
        match self {
            BackendEvent::Message { data, .. } => data.clone(),
            BackendEvent::Closed { id, .. } => format!("MPD Connection [{}] Closed", id),
        }
    }
}

/// Diagnostic view of a backend. Never carries the credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendSnapshot {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub connectivity: ConnectivityState,
    pub auth: AuthState,
    pub has_credential: bool,
    pub created_at: String,
}

/// Configuration for spawning a backend connection
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub id: BackendId,
    pub credential: Option<String>,
    pub connect_timeout: Duration,
    /// Capacity of the inbound event broadcast channel
    pub event_capacity: usize,
}

impl BackendConfig {
    pub fn new(id: BackendId) -> Self {
        Self {
            id,
            credential: None,
            connect_timeout: Duration::from_secs(5),
            event_capacity: 1024,
        }
    }
}

/// Messages that can be sent to the connection actor
enum BackendMessage {
    Open {
        respond_to: Option<oneshot::Sender<Result<(), BackendError>>>,
    },
    Send {
        payload: String,
        respond_to: oneshot::Sender<Result<usize, BackendError>>,
    },
    MarkAuthenticated {
        respond_to: oneshot::Sender<bool>,
    },
    /// Reported by the reader task of transport session `session`
    TransportClosed { session: u64, reason: String },
}

/// Paired replies produced by [`BackendHandle::correlated`]
pub type CorrelatedReplies<F> = Correlated<
    BoxStream<'static, String>,
    BoxStream<'static, Result<String, BackendError>>,
    String,
    F,
>;

/// Handle to communicate with a backend connection actor
#[derive(Clone)]
pub struct BackendHandle {
    id: BackendId,
    sender: mpsc::Sender<BackendMessage>,
    status: Arc<RwLock<ConnectionStatus>>,
    events_tx: broadcast::Sender<BackendEvent>,
    commands_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
    /// Cancelled by the actor once it has released the transport
    stopped: CancellationToken,
    has_credential: bool,
    created_at: DateTime<Utc>,
}

impl BackendHandle {
    pub fn id(&self) -> &BackendId {
        &self.id
    }

    /// Start connecting without waiting for the outcome.
    pub(crate) fn start(&self) {
        if let Err(e) = self.sender.try_send(BackendMessage::Open { respond_to: None }) {
            warn!("Could not start connecting to {}: {}", self.id, e);
        }
    }

    /// Connect if not already connected or connecting.
    pub async fn open(&self) -> Result<(), BackendError> {
        if self.status.read().await.connectivity != ConnectivityState::Disconnected {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BackendMessage::Open {
                respond_to: Some(tx),
            })
            .await
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Write one command line, reconnecting and resending the credential
    /// first when needed. Returns the number of bytes written.
    pub async fn send(&self, payload: &str) -> Result<usize, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BackendMessage::Send {
                payload: payload.to_string(),
                respond_to: tx,
            })
            .await
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Record that the backend accepted the credential. Returns false (and
    /// changes nothing) unless the connection is currently up.
    pub async fn mark_authenticated(&self) -> Result<bool, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BackendMessage::MarkAuthenticated { respond_to: tx })
            .await
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())
    }

    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    pub async fn snapshot(&self) -> BackendSnapshot {
        let status = self.status().await;
        BackendSnapshot {
            id: self.id.to_string(),
            host: self.id.host.clone(),
            port: self.id.port,
            connectivity: status.connectivity,
            auth: status.auth,
            has_credential: self.has_credential,
            created_at: self.created_at.to_rfc3339(),
        }
    }

    /// Subscribe to every event for the lifetime of this backend, across
    /// reconnects.
    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events_tx.subscribe()
    }

    /// Inbound replies of the current transport session. The stream completes
    /// at the next `Closed` event and does not follow reconnects.
    pub fn messages(&self) -> BoxStream<'static, String> {
        let rx = self.events_tx.subscribe();
        stream::unfold(Some(rx), |state| async move {
            let mut rx = state?;
            loop {
                match rx.recv().await {
                    Ok(BackendEvent::Message { data, .. }) => return Some((data, Some(rx))),
                    Ok(BackendEvent::Closed { .. }) => return None,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Message stream lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Command lines as they are written, `password` included (credential
    /// masked). A lagging subscriber gets an error since pairing would be off.
    pub fn commands(&self) -> BoxStream<'static, Result<String, BackendError>> {
        let rx = self.commands_tx.subscribe();
        stream::unfold(Some(rx), |state| async move {
            let mut rx = state?;
            match rx.recv().await {
                Ok(command) => Some((Ok(command), Some(rx))),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    Some((Err(BackendError::Lagged(n)), None))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
        .boxed()
    }

    /// Replies of the current session paired with the command that produced
    /// them, `default` when none was pending (e.g. the greeting). Only pairs
    /// `accept` takes as genuine responses are yielded.
    pub fn correlated<F>(&self, default: impl Into<String>, accept: F) -> CorrelatedReplies<F>
    where
        F: FnMut(&Paired<String, String>) -> bool + Unpin,
    {
        correlate(self.messages(), self.commands(), default.into(), accept)
    }

    /// Resolves once the backend has been shut down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the connection: cancels pending connect/read and releases the
    /// transport. Pending commands are dropped.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.stopped.cancelled().await;
    }

    fn gone(&self) -> BackendError {
        if self.cancel.is_cancelled() {
            BackendError::Shutdown(self.id.clone())
        } else {
            BackendError::ActorGone(self.id.clone())
        }
    }
}

/// The actor that owns a single backend connection
pub(crate) struct BackendActor {
    config: BackendConfig,
    status: Arc<RwLock<ConnectionStatus>>,
    writer: Option<OwnedWriteHalf>,
    /// A `password` line went out on the current transport
    credential_sent: bool,
    /// Incremented for every transport session so stale close reports are ignored
    session: u64,
    session_cancel: Option<CancellationToken>,
    receiver: mpsc::Receiver<BackendMessage>,
    mailbox: mpsc::WeakSender<BackendMessage>,
    events_tx: broadcast::Sender<BackendEvent>,
    commands_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
    stopped: CancellationToken,
}

impl BackendActor {
    /// Spawn the actor in the Disconnected state and return its handle.
    pub(crate) fn spawn(config: BackendConfig) -> BackendHandle {
        let (sender, receiver) = mpsc::channel(32);
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (commands_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let status = Arc::new(RwLock::new(ConnectionStatus::default()));
        let cancel = CancellationToken::new();
        let stopped = CancellationToken::new();

        let handle = BackendHandle {
            id: config.id.clone(),
            sender: sender.clone(),
            status: status.clone(),
            events_tx: events_tx.clone(),
            commands_tx: commands_tx.clone(),
            cancel: cancel.clone(),
            stopped: stopped.clone(),
            has_credential: config.credential.is_some(),
            created_at: Utc::now(),
        };

        let actor = BackendActor {
            config,
            status,
            writer: None,
            credential_sent: false,
            session: 0,
            session_cancel: None,
            receiver,
            mailbox: sender.downgrade(),
            events_tx,
            commands_tx,
            cancel,
            stopped,
        };

        tokio::spawn(async move {
            actor.run().await;
        });

        handle
    }

    async fn run(mut self) {
        debug!("Backend actor {} started", self.config.id);

        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = self.receiver.recv() => msg,
            };
            let Some(msg) = msg else { break };

            match msg {
                BackendMessage::Open { respond_to } => {
                    let result = self.open().await;
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(result);
                    }
                }
                BackendMessage::Send {
                    payload,
                    respond_to,
                } => {
                    let result = self.send(&payload).await;
                    let _ = respond_to.send(result);
                }
                BackendMessage::MarkAuthenticated { respond_to } => {
                    let accepted = self.writer.is_some()
                        && self.config.credential.is_some()
                        && self.credential_sent;
                    if accepted {
                        self.status.write().await.auth = AuthState::Authenticated;
                        debug!("Backend {} marked authenticated", self.config.id);
                    }
                    let _ = respond_to.send(accepted);
                }
                BackendMessage::TransportClosed { session, reason } => {
                    if session == self.session && self.writer.is_some() {
                        info!("MPD Connection [{}] Closed: {}", self.config.id, reason);
                        self.disconnect(reason).await;
                    }
                }
            }
        }

        self.release().await;
        self.stopped.cancel();
        debug!("Backend actor {} stopped", self.config.id);
    }

    async fn set_connectivity(&self, connectivity: ConnectivityState) {
        let mut status = self.status.write().await;
        status.connectivity = connectivity;
        if connectivity != ConnectivityState::Connected {
            status.auth = AuthState::Unauthenticated;
        }
    }

    async fn open(&mut self) -> Result<(), BackendError> {
        if self.writer.is_some() {
            return Ok(());
        }

        let id = self.config.id.clone();
        self.set_connectivity(ConnectivityState::Connecting).await;
        debug!("Connecting to backend {}", id);

        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((id.host.as_str(), id.port)),
        );
        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err(BackendError::Shutdown(id.clone())),
            r = connect => match r {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(source)) => Err(BackendError::ConnectFailed { id: id.clone(), source }),
                Err(_) => Err(BackendError::ConnectTimeout {
                    id: id.clone(),
                    timeout: self.config.connect_timeout,
                }),
            },
        };

        match result {
            Ok(stream) => {
                let Some(mailbox) = self.mailbox.upgrade() else {
                    return Err(BackendError::ActorGone(id));
                };
                let (read_half, write_half) = stream.into_split();
                self.session += 1;
                let session_cancel = self.cancel.child_token();
                tokio::spawn(read_loop(
                    id.clone(),
                    read_half,
                    self.session,
                    session_cancel.clone(),
                    self.events_tx.clone(),
                    mailbox,
                ));
                self.session_cancel = Some(session_cancel);
                self.writer = Some(write_half);
                self.credential_sent = false;
                self.set_connectivity(ConnectivityState::Connected).await;
                info!("MPD connected [{}]", id);
                Ok(())
            }
            Err(e) => {
                warn!("MPD connection to {} failed: {}", id, e);
                self.disconnect(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn send(&mut self, payload: &str) -> Result<usize, BackendError> {
        if self.writer.is_none() {
            self.open().await?;
        }

        let mut written = 0;
        let status = *self.status.read().await;
        if let Some(credential) = self.config.credential.clone() {
            // Sent ahead of every command until something marks the session
            // authenticated; the reply to `password` is not inspected.
            if status.auth == AuthState::Unauthenticated {
                let _ = self.commands_tx.send("password ******".to_string());
                written += self.write_line(&format!("password {}", credential)).await?;
                self.credential_sent = true;
            }
        }

        let line = payload.trim_end_matches(['\r', '\n']);
        debug!("Sending MPD [{}] {}", self.config.id, line);
        let _ = self.commands_tx.send(line.to_string());
        written += self.write_line(line).await?;
        Ok(written)
    }

    async fn write_line(&mut self, line: &str) -> Result<usize, BackendError> {
        let id = self.config.id.clone();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BackendError::WriteFailed {
                id: id.clone(),
                source: std::io::ErrorKind::NotConnected.into(),
            })?;

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        // A backend that stops reading must not block shutdown
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Write to {} abandoned on shutdown", id);
                return Err(BackendError::Shutdown(id));
            }
            r = async {
                writer.write_all(&bytes).await?;
                writer.flush().await
            } => r,
        };

        match result {
            Ok(()) => Ok(bytes.len()),
            Err(source) => {
                warn!("Write to {} failed: {}", id, source);
                self.disconnect(source.to_string()).await;
                Err(BackendError::WriteFailed { id, source })
            }
        }
    }

    /// Drop the transport and publish the synthetic close notification.
    async fn disconnect(&mut self, reason: String) {
        if let Some(cancel) = self.session_cancel.take() {
            cancel.cancel();
        }
        self.writer = None;
        self.credential_sent = false;
        self.set_connectivity(ConnectivityState::Disconnected).await;
        let _ = self.events_tx.send(BackendEvent::Closed {
            id: self.config.id.clone(),
            reason,
        });
    }

    /// Release the transport without notifying subscribers.
    async fn release(&mut self) {
        if let Some(cancel) = self.session_cancel.take() {
            cancel.cancel();
        }
        self.credential_sent = false;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.set_connectivity(ConnectivityState::Disconnected).await;
    }
}

async fn read_loop(
    id: BackendId,
    read_half: OwnedReadHalf,
    session: u64,
    cancel: CancellationToken,
    events_tx: broadcast::Sender<BackendEvent>,
    mailbox: mpsc::Sender<BackendMessage>,
) {
    let mut reader = BufReader::new(read_half);
    let mut framer = ReplyFramer::new();
    let mut buf = Vec::with_capacity(256);

    let reason = loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            r = reader.read_until(b'\n', &mut buf) => r,
        };
        match read {
            Ok(0) => break "connection closed by remote".to_string(),
            Ok(_) => match decode_line(&buf) {
                Ok(line) => {
                    if let Some(reply) = framer.push_line(line) {
                        debug!("MPD at {} says {}", id, reply.trim_end());
                        let _ = events_tx.send(BackendEvent::Message {
                            id: id.clone(),
                            data: reply,
                        });
                    }
                }
                Err(e) => {
                    warn!("Dropping malformed line from {}: {}", id, e);
                }
            },
            Err(e) => break e.to_string(),
        }
    };

    if let Some(partial) = framer.flush() {
        let _ = events_tx.send(BackendEvent::Message {
            id: id.clone(),
            data: partial,
        });
    }

    let _ = mailbox
        .send(BackendMessage::TransportClosed { session, reason })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeReply, spawn_fake_mpd};
    use correlator::Paired;

    fn config(id: BackendId, credential: Option<&str>) -> BackendConfig {
        BackendConfig {
            credential: credential.map(str::to_string),
            connect_timeout: Duration::from_secs(2),
            ..BackendConfig::new(id)
        }
    }

    async fn wait_for(handle: &BackendHandle, want: ConnectivityState) {
        for _ in 0..200 {
            if handle.status().await.connectivity == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("backend never reached {:?}", want);
    }

    #[tokio::test]
    async fn starts_disconnected_then_connects() {
        let mut fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));

        assert_eq!(
            handle.status().await,
            ConnectionStatus {
                connectivity: ConnectivityState::Disconnected,
                auth: AuthState::Unauthenticated,
            }
        );

        handle.open().await.unwrap();
        assert_eq!(
            handle.status().await.connectivity,
            ConnectivityState::Connected
        );

        // Opening again is a no-op
        handle.open().await.unwrap();
        handle.send("ping").await.unwrap();
        assert_eq!(fake.next_line().await, "ping");
        assert_eq!(fake.accepted(), 1);
    }

    #[tokio::test]
    async fn credential_precedes_every_command_until_authenticated() {
        let mut fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let handle = BackendActor::spawn(config(fake.id.clone(), Some("secret")));

        handle.open().await.unwrap();
        handle.send("status").await.unwrap();
        assert_eq!(fake.next_line().await, "password secret");
        assert_eq!(fake.next_line().await, "status");

        handle.send("currentsong").await.unwrap();
        assert_eq!(fake.next_line().await, "password secret");
        assert_eq!(fake.next_line().await, "currentsong");

        assert!(handle.mark_authenticated().await.unwrap());
        assert_eq!(handle.status().await.auth, AuthState::Authenticated);

        handle.send("play").await.unwrap();
        assert_eq!(fake.next_line().await, "play");
    }

    #[tokio::test]
    async fn mark_authenticated_requires_connection() {
        let handle = BackendActor::spawn(config(BackendId::new("127.0.0.1", 1), Some("x")));
        assert!(!handle.mark_authenticated().await.unwrap());
        assert_eq!(handle.status().await.auth, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn mark_authenticated_requires_a_credential() {
        let fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));
        handle.open().await.unwrap();
        handle.send("status").await.unwrap();

        assert!(!handle.mark_authenticated().await.unwrap());
        assert_eq!(handle.status().await.auth, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn mark_authenticated_requires_credential_sent() {
        let mut fake = spawn_fake_mpd(|line| match line {
            "close" => FakeReply::Close,
            _ => FakeReply::Ok,
        })
        .await;
        let handle = BackendActor::spawn(config(fake.id.clone(), Some("secret")));
        let mut events = handle.subscribe();

        // Connected, but no command has carried the password yet
        handle.open().await.unwrap();
        assert!(!handle.mark_authenticated().await.unwrap());
        assert_eq!(handle.status().await.auth, AuthState::Unauthenticated);

        handle.send("close").await.unwrap();
        assert_eq!(fake.next_line().await, "password secret");
        assert_eq!(fake.next_line().await, "close");
        loop {
            if let BackendEvent::Closed { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        wait_for(&handle, ConnectivityState::Disconnected).await;

        // A fresh transport has not sent the password either
        handle.open().await.unwrap();
        assert!(!handle.mark_authenticated().await.unwrap());

        handle.send("ping").await.unwrap();
        assert_eq!(fake.next_line().await, "password secret");
        assert_eq!(fake.next_line().await, "ping");
        assert!(handle.mark_authenticated().await.unwrap());
        assert_eq!(handle.status().await.auth, AuthState::Authenticated);
    }

    #[tokio::test]
    async fn send_reconnects_when_disconnected() {
        let mut fake = spawn_fake_mpd(|line| {
            if line == "close" {
                FakeReply::Close
            } else {
                FakeReply::Ok
            }
        })
        .await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));
        let mut events = handle.subscribe();

        handle.send("close").await.unwrap();
        assert_eq!(fake.next_line().await, "close");

        // greeting first, then the synthetic close
        loop {
            match events.recv().await.unwrap() {
                BackendEvent::Closed { id, .. } => {
                    assert_eq!(id, fake.id);
                    break;
                }
                BackendEvent::Message { .. } => continue,
            }
        }
        wait_for(&handle, ConnectivityState::Disconnected).await;

        handle.send("status").await.unwrap();
        assert_eq!(fake.next_line().await, "status");
        assert_eq!(fake.accepted(), 2);
        assert_eq!(
            handle.status().await.connectivity,
            ConnectivityState::Connected
        );
    }

    #[tokio::test]
    async fn failed_connect_publishes_close_and_stays_disconnected() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let handle = BackendActor::spawn(config(BackendId::new("127.0.0.1", port), None));
        let mut events = handle.subscribe();

        let err = handle.send("status").await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {}", err);
        assert!(matches!(
            events.recv().await.unwrap(),
            BackendEvent::Closed { .. }
        ));
        assert_eq!(
            handle.status().await.connectivity,
            ConnectivityState::Disconnected
        );
    }

    #[tokio::test]
    async fn messages_stream_completes_on_close() {
        let fake = spawn_fake_mpd(|line| match line {
            "close" => FakeReply::Close,
            _ => FakeReply::Ok,
        })
        .await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));
        let messages = handle.messages();

        handle.send("ping").await.unwrap();
        handle.send("close").await.unwrap();

        let collected: Vec<String> = messages.collect().await;
        assert_eq!(collected, vec!["OK MPD 0.23.5\n".to_string(), "OK\n".to_string()]);
    }

    #[tokio::test]
    async fn correlated_pairs_replies_with_commands() {
        let fake = spawn_fake_mpd(|line| match line {
            "status" => FakeReply::Text("state: play\nOK\n".into()),
            "close" => FakeReply::Close,
            _ => FakeReply::Ok,
        })
        .await;
        let handle = BackendActor::spawn(config(fake.id.clone(), Some("pw")));
        let mut paired = handle.correlated("(none)", |_| true);

        handle.open().await.unwrap();
        assert_eq!(
            paired.next().await.unwrap().unwrap(),
            Paired::new("OK MPD 0.23.5\n".to_string(), "(none)".to_string())
        );

        handle.send("status").await.unwrap();
        assert_eq!(
            paired.next().await.unwrap().unwrap(),
            Paired::new("OK\n".to_string(), "password ******".to_string())
        );
        assert_eq!(
            paired.next().await.unwrap().unwrap(),
            Paired::new("state: play\nOK\n".to_string(), "status".to_string())
        );
    }

    #[tokio::test]
    async fn correlated_filter_skips_unsolicited_replies() {
        let fake = spawn_fake_mpd(|line| match line {
            "status" => FakeReply::Text("state: play\nOK\n".into()),
            _ => FakeReply::Ok,
        })
        .await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));
        let mut paired = handle.correlated("(none)", |p| p.command != "(none)");

        // The greeting pairs with the default and is skipped
        handle.send("status").await.unwrap();
        assert_eq!(
            paired.next().await.unwrap().unwrap(),
            Paired::new("state: play\nOK\n".to_string(), "status".to_string())
        );
    }

    #[tokio::test]
    async fn non_utf8_lines_are_dropped() {
        let fake = spawn_fake_mpd(|line| match line {
            "garbage" => FakeReply::Raw(b"\xff\xfe\nOK\n".to_vec()),
            _ => FakeReply::Ok,
        })
        .await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));
        let mut messages = handle.messages();

        handle.send("garbage").await.unwrap();
        assert_eq!(messages.next().await.unwrap(), "OK MPD 0.23.5\n");
        assert_eq!(messages.next().await.unwrap(), "OK\n");
    }

    #[tokio::test]
    async fn shutdown_releases_transport() {
        let fake = spawn_fake_mpd(|_| FakeReply::Ok).await;
        let handle = BackendActor::spawn(config(fake.id.clone(), None));
        handle.open().await.unwrap();

        handle.shutdown().await;
        assert!(handle.is_shut_down());
        assert_eq!(
            handle.status().await.connectivity,
            ConnectivityState::Disconnected
        );
        assert!(matches!(
            handle.send("status").await,
            Err(BackendError::Shutdown(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_blocked_write() {
        // Accepts and then never reads, so the socket buffers fill up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let handle = BackendActor::spawn(config(BackendId::new("127.0.0.1", port), None));
        handle.open().await.unwrap();

        let sender = handle.clone();
        let blocked = tokio::spawn(async move { sender.send(&"x".repeat(64 << 20)).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!blocked.is_finished());

        tokio::time::timeout(Duration::from_secs(3), handle.shutdown())
            .await
            .expect("shutdown stuck behind a write");
        assert!(matches!(
            blocked.await.unwrap(),
            Err(BackendError::Shutdown(_))
        ));
        assert_eq!(
            handle.status().await.connectivity,
            ConnectivityState::Disconnected
        );
    }

    #[test]
    fn closed_event_client_text() {
        let ev = BackendEvent::Closed {
            id: BackendId::new("127.0.0.1", 6600),
            reason: "eof".into(),
        };
        assert_eq!(ev.client_text(), "MPD Connection [127.0.0.1:6600] Closed");
    }

    #[test]
    fn snapshot_serde_hides_credential() {
        let snap = BackendSnapshot {
            id: "h:1".into(),
            host: "h".into(),
            port: 1,
            connectivity: ConnectivityState::Connecting,
            auth: AuthState::Unauthenticated,
            has_credential: true,
            created_at: "2025-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["connectivity"], "connecting");
        assert_eq!(json["auth"], "unauthenticated");
        assert_eq!(json["has_credential"], true);
        assert!(json.get("credential").is_none());
    }
}
