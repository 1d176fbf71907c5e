use backend_manager::{BackendError, BackendId};
use serde::Deserialize;

/// Inbound client message.
///
/// Older clients use `mpdHost` / `mpdCommand`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientCommand {
    #[serde(rename = "targetBackendId", alias = "mpdHost")]
    pub target: String,
    #[serde(alias = "mpdCommand")]
    pub command: String,
    #[serde(default, alias = "pass")]
    pub credential: Option<String>,
}

impl ClientCommand {
    pub fn backend_id(&self) -> Result<BackendId, BackendError> {
        self.target.parse()
    }

    /// Credential to use when this command creates the backend.
    pub fn credential(&self) -> Option<String> {
        self.credential.clone().filter(|c| !c.is_empty())
    }
}
