use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Core controller a request is addressed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Mixer,
    Playback,
    Tracklist,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Mixer => "mixer",
            Scope::Playback => "playback",
            Scope::Tracklist => "tracklist",
        }
    }

    /// Substrings of event names that belong to this scope.
    pub fn event_keywords(&self) -> &'static [&'static str] {
        match self {
            Scope::Mixer => &["mute", "volume"],
            Scope::Playback => &["playback", "seeked", "stream"],
            Scope::Tracklist => &["tracklist", "options"],
        }
    }

    pub fn matches_event(&self, event: &str) -> bool {
        self.event_keywords().iter().any(|k| event.contains(k))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON-RPC 2.0 request envelope.
///
/// Mopidy replies carry the id back, but every request uses id 1 so replies
/// are matched by order instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(scope: Scope, command: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: 1,
            method: format!("core.{}.{}", scope, command),
            params: params.unwrap_or_else(|| Value::Object(Map::new())),
        }
    }

    /// Build a request from named parameters, leaving out the ones that are
    /// `None`.
    pub(crate) fn with_params<const N: usize>(
        scope: Scope,
        command: &str,
        params: [(&str, Option<Value>); N],
    ) -> Self {
        let map: Map<String, Value> = params
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect();
        Self::new(scope, command, Some(Value::Object(map)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
