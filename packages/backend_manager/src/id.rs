use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BackendError;

/// Identity of a backend: the address it is reached at.
///
/// Rendered and parsed as `host:port`. IPv6 hosts are written in brackets
/// (`[::1]:6600`).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BackendId {
    pub host: String,
    pub port: u16,
}

impl BackendId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for BackendId {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| BackendError::InvalidId(s.to_string()))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(BackendError::InvalidId(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| BackendError::InvalidId(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
