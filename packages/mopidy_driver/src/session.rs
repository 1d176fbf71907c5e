use futures::stream::{self, BoxStream, StreamExt};
use futures::{Sink, SinkExt, Stream};
use std::fmt;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::close::{WEBSOCKET_CLOSED, classify_close};
use crate::error::MopidyError;
use crate::message::MopidyMessage;
use crate::request::Request;

const CHANNEL_CAPACITY: usize = 256;

/// Item of the shared inbound stream
pub type MessageResult = Result<MopidyMessage, MopidyError>;

/// One WebSocket to Mopidy shared by every driver.
///
/// Inbound frames are classified once and fanned out; each call to
/// [`messages`](Self::messages) is an independent view that ends at the first
/// error or at the `websocket_closed` event.
#[derive(Clone)]
pub struct MopidySession {
    outbound: mpsc::UnboundedSender<Request>,
    sent_tx: broadcast::Sender<Request>,
    inbound_tx: broadcast::Sender<MessageResult>,
}

impl MopidySession {
    /// Connect to a Mopidy HTTP frontend, e.g. `ws://localhost:6680/mopidy/ws`.
    pub async fn connect(url: &str) -> Result<Self, MopidyError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        debug!("Connected to Mopidy at {}", url);
        let (sink, stream) = ws.split();
        Ok(Self::from_parts(sink, stream))
    }

    /// Drive an already established socket split into its two halves.
    pub fn from_parts<S, R, E>(sink: S, stream: R) -> Self
    where
        S: Sink<WsMessage> + Send + Unpin + 'static,
        S::Error: fmt::Display + Send,
        R: Stream<Item = Result<WsMessage, E>> + Send + Unpin + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (inbound_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        tokio::spawn(write_loop(sink, outbound_rx, inbound_tx.clone()));
        tokio::spawn(read_loop(stream, inbound_tx.clone()));

        Self {
            outbound,
            sent_tx,
            inbound_tx,
        }
    }

    /// Queue a request for sending. It is also published to
    /// [`commands`](Self::commands) so replies can be paired with it.
    pub fn send(&self, request: Request) -> Result<(), MopidyError> {
        debug!("Mopidy request {}", request.method);
        let _ = self.sent_tx.send(request.clone());
        self.outbound
            .send(request)
            .map_err(|_| MopidyError::Transport("session writer has stopped".to_string()))
    }

    pub fn messages(&self) -> BoxStream<'static, MessageResult> {
        let rx = self.inbound_tx.subscribe();
        stream::unfold(Some(rx), |state| async move {
            let mut rx = state?;
            match rx.recv().await {
                Ok(Ok(msg)) => {
                    let last = msg.event_name() == Some(WEBSOCKET_CLOSED);
                    Some((Ok(msg), if last { None } else { Some(rx) }))
                }
                Ok(Err(e)) => Some((Err(e), None)),
                Err(broadcast::error::RecvError::Lagged(n)) => Some((
                    Err(MopidyError::Protocol(format!(
                        "message stream lagged by {} frames",
                        n
                    ))),
                    None,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
        .boxed()
    }

    /// Requests as they are sent, in order.
    pub fn commands(&self) -> BoxStream<'static, Result<Request, MopidyError>> {
        let rx = self.sent_tx.subscribe();
        stream::unfold(Some(rx), |state| async move {
            let mut rx = state?;
            match rx.recv().await {
                Ok(req) => Some((Ok(req), Some(rx))),
                Err(broadcast::error::RecvError::Lagged(n)) => Some((
                    Err(MopidyError::Protocol(format!(
                        "command stream lagged by {} requests",
                        n
                    ))),
                    None,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
        .boxed()
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut outbound_rx: mpsc::UnboundedReceiver<Request>,
    inbound_tx: broadcast::Sender<MessageResult>,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(request) = outbound_rx.recv().await {
        let json = match request.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize Mopidy request: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(WsMessage::Text(json.into())).await {
            warn!("Mopidy send failed: {}", e);
            let _ = inbound_tx.send(Err(MopidyError::Transport(e.to_string())));
            break;
        }
    }
}

async fn read_loop<R, E>(mut stream: R, inbound_tx: broadcast::Sender<MessageResult>)
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let item = match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => MopidyMessage::parse(text.as_str()),
            Some(Ok(WsMessage::Binary(_))) => Err(MopidyError::Protocol(
                "unexpected binary frame".to_string(),
            )),
            Some(Ok(WsMessage::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                    .unwrap_or((1005, String::new()));
                debug!("Mopidy closed the socket with {}", code);
                let _ = inbound_tx.send(classify_close(code, &reason));
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                let _ = inbound_tx.send(Err(MopidyError::Transport(e.to_string())));
                break;
            }
            None => {
                let _ = inbound_tx.send(classify_close(1006, ""));
                break;
            }
        };
        if let Err(e) = &item {
            warn!("Mopidy message error: {}", e);
        }
        let _ = inbound_tx.send(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Scope;
    use futures::channel::mpsc as fmpsc;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;

    type Inbound = fmpsc::UnboundedSender<Result<WsMessage, String>>;

    fn session() -> (MopidySession, Inbound, fmpsc::UnboundedReceiver<WsMessage>) {
        let (sink, written) = fmpsc::unbounded::<WsMessage>();
        let (inbound, stream) = fmpsc::unbounded::<Result<WsMessage, String>>();
        (MopidySession::from_parts(sink, stream), inbound, written)
    }

    fn text(s: &str) -> Result<WsMessage, String> {
        Ok(WsMessage::Text(s.to_string().into()))
    }

    #[tokio::test]
    async fn sent_requests_are_written_as_json() {
        let (session, _inbound, mut written) = session();
        let mut commands = session.commands();

        session
            .send(Request::new(Scope::Mixer, "get_volume", None))
            .unwrap();

        let frame = written.next().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(json["method"], "core.mixer.get_volume");
        assert_eq!(
            commands.next().await.unwrap().unwrap().method,
            "core.mixer.get_volume"
        );
    }

    #[tokio::test]
    async fn normal_close_ends_the_stream_with_an_event() {
        let (session, inbound, _written) = session();
        let messages = session.messages();

        inbound.unbounded_send(text(r#"{"event":"volume_changed","volume":3}"#)).unwrap();
        inbound
            .unbounded_send(Ok(WsMessage::Close(Some(CloseFrame {
                code: WsCloseCode::Normal,
                reason: "done".into(),
            }))))
            .unwrap();

        let items: Vec<_> = messages.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap().event_name(), Some(WEBSOCKET_CLOSED));
    }

    #[tokio::test]
    async fn remote_error_ends_the_stream() {
        let (session, inbound, _written) = session();
        let messages = session.messages();

        inbound
            .unbounded_send(text(r#"{"jsonrpc":"2.0","id":1,"error":{"code":1}}"#))
            .unwrap();
        inbound.unbounded_send(text(r#"{"jsonrpc":"2.0","id":1,"result":1}"#)).unwrap();

        let items: Vec<_> = messages.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MopidyError::Remote(_))));
    }

    #[tokio::test]
    async fn dropped_socket_is_abnormal_close() {
        let (session, inbound, _written) = session();
        let messages = session.messages();
        drop(inbound);

        let items: Vec<_> = messages.collect().await;
        assert!(matches!(
            items.as_slice(),
            [Err(MopidyError::Closed { code: 1006, .. })]
        ));
    }
}
