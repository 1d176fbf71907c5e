use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backend_manager::BackendOptions;

// =============================================================================
// File config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [backend]
//                    connect_timeout_ms = 2000
//
//   env var:         MPD_PROXY_BACKEND__CONNECT_TIMEOUT_MS=2000
//                    (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub backend: BackendFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
    #[serde(default)]
    pub correlator: CorrelatorFileConfig,
}

/// Listener address (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Backend connection tunables (lives under `[backend]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendFileConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for BackendFileConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// WebSocket surface tunables (lives under `[websocket]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: default_send_channel_capacity(),
            protocol: default_protocol(),
        }
    }
}

/// Correlation tunables (lives under `[correlator]`). `max_pending = 0`
/// leaves the pending command queue unbounded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CorrelatorFileConfig {
    #[serde(default)]
    pub max_pending: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_event_capacity() -> usize {
    1024
}
fn default_send_channel_capacity() -> usize {
    100
}
fn default_protocol() -> String {
    "echo-protocol".to_string()
}

/// Build a figment that layers: defaults → config.toml → MPD_PROXY_* env vars.
///
///   `MPD_PROXY_SERVER__PORT=8080`  →  `server.port = 8080`
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("config.toml")))
        .merge(Env::prefixed("MPD_PROXY_").split("__"))
}

/// Where config.toml is looked up when `--config-dir` is not given.
pub fn default_config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("Could not determine the user config directory")?
        .join("mpd-proxy");
    Ok(dir)
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub backend: BackendOptions,
    pub websocket: WebSocketConfig,
    /// Bound on commands awaiting a reply per correlated stream
    pub max_pending: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Channel capacity for messages to each client
    pub send_channel_capacity: usize,
    /// Subprotocol offered during the upgrade
    pub protocol: String,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            backend: BackendOptions {
                connect_timeout: Duration::from_millis(fc.backend.connect_timeout_ms),
                event_capacity: fc.backend.event_capacity.max(1),
            },
            websocket: WebSocketConfig {
                send_channel_capacity: fc.websocket.send_channel_capacity.max(1),
                protocol: fc.websocket.protocol.clone(),
            },
            max_pending: match fc.correlator.max_pending {
                0 => None,
                n => Some(n),
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

/// Resolve the config directory and extract the layered configuration.
pub fn resolve(custom_dir: Option<PathBuf>) -> Result<(PathBuf, FileConfig)> {
    let config_dir = match custom_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    let fc: FileConfig = load_config(&config_dir)
        .extract()
        .with_context(|| format!("Invalid configuration in {}", config_dir.display()))?;
    Ok((config_dir, fc))
}
