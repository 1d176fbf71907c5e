use serde_json::Value;

/// Errors surfaced on a Mopidy message stream. Any of them terminates the
/// stream that yields it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MopidyError {
    /// The WebSocket failed underneath us
    #[error("websocket error: {0}")]
    Transport(String),

    /// A frame could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Mopidy answered with a JSON-RPC error object
    #[error("mopidy error: {0}")]
    Remote(Value),

    /// The socket closed with a code above 1000
    #[error("websocket closed with code {code}: {reason}")]
    Closed { code: u16, reason: String },
}

impl From<serde_json::Error> for MopidyError {
    fn from(e: serde_json::Error) -> Self {
        MopidyError::Protocol(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MopidyError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        MopidyError::Transport(e.to_string())
    }
}
