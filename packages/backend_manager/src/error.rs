use std::time::Duration;

use crate::id::BackendId;

/// Errors that can occur while talking to a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The id could not be parsed as `host:port`
    #[error("invalid backend id '{0}': expected host:port")]
    InvalidId(String),

    #[error("failed to connect to {id}: {source}")]
    ConnectFailed {
        id: BackendId,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {id} after {timeout:?}")]
    ConnectTimeout { id: BackendId, timeout: Duration },

    #[error("failed to write to {id}: {source}")]
    WriteFailed {
        id: BackendId,
        #[source]
        source: std::io::Error,
    },

    /// The connection was destroyed while the operation was pending
    #[error("backend {0} has been shut down")]
    Shutdown(BackendId),

    /// Channel communication with the connection actor failed
    #[error("backend actor for {0} is gone")]
    ActorGone(BackendId),

    /// A subscriber fell behind the broadcast channel and missed items
    #[error("subscriber lagged behind by {0} items")]
    Lagged(u64),
}

impl BackendError {
    /// Whether this error came from the transport (connect/read/write).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BackendError::ConnectFailed { .. }
                | BackendError::ConnectTimeout { .. }
                | BackendError::WriteFailed { .. }
        )
    }
}
