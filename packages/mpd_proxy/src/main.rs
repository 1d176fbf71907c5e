use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use backend_manager::BackendRegistry;
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod controller;
mod handlers;
mod hub;
mod metrics;
#[cfg(test)]
mod test_helpers;
mod ws;

use crate::config::{FileConfig, ServerConfig};
use crate::controller::ProxyController;
use crate::hub::ClientHub;
use crate::metrics::ServerMetrics;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "mpd-proxy")]
#[command(about = "WebSocket proxy multiplexing clients onto MPD servers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding config.toml (defaults to the user config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy in the foreground (the default)
    Serve(ServeArgs),

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Parser, Default)]
struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub controller: Arc<ProxyController>,
    pub registry: Arc<BackendRegistry>,
    pub hub: Arc<ClientHub>,
    /// Server runtime configuration
    pub config: Arc<ServerConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(BackendRegistry::new(config.backend.clone()));
        let hub = Arc::new(ClientHub::new());
        let metrics = Arc::new(ServerMetrics::new());
        let controller = Arc::new(ProxyController::new(
            registry.clone(),
            hub.clone(),
            metrics.clone(),
            config.max_pending,
        ));
        Self {
            controller,
            registry,
            hub,
            config,
            metrics,
        }
    }
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/create", post(handlers::create_backend))
        .route("/api/destroy", post(handlers::destroy_backend))
        .route("/api/backends", get(handlers::list_backends))
        .route("/api/clients", get(handlers::list_clients))
        .route("/ws", get(handlers::websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config_dir, file_config) = config::resolve(cli.config_dir)?;

    match cli.command {
        None => run_server(ServeArgs::default(), config_dir, file_config).await,
        Some(Commands::Serve(args)) => run_server(args, config_dir, file_config).await,
        Some(Commands::ShowConfig) => {
            let text = toml::to_string_pretty(&file_config)
                .context("Failed to render configuration")?;
            print!("{}", text);
            Ok(())
        }
    }
}

async fn run_server(
    args: ServeArgs,
    config_dir: PathBuf,
    mut file_config: FileConfig,
) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "mpd_proxy=debug,backend_manager=debug,tower_http=debug,info"
    } else {
        "mpd_proxy=info,backend_manager=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting MPD proxy");
    info!("Config directory: {}", config_dir.display());

    if let Some(host) = args.host {
        file_config.server.host = host;
    }
    if let Some(port) = args.port {
        file_config.server.port = port;
    }

    let server_config = ServerConfig::from_file(&file_config);
    info!(
        "Server config: connect_timeout={:?}, client_queue={}, protocol={}",
        server_config.backend.connect_timeout,
        server_config.websocket.send_channel_capacity,
        server_config.websocket.protocol
    );

    let app_state = AppState::new(server_config);
    let registry_for_shutdown = app_state.registry.clone();
    let app = build_router(app_state);

    let addr = format!("{}:{}", file_config.server.host, file_config.server.port)
        .parse::<SocketAddr>()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                file_config.server.host, file_config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("MPD proxy listening on http://{}", actual_addr);
    info!("API endpoints:");
    info!("  POST   /api/create    - Connect to an MPD server");
    info!("  POST   /api/destroy   - Drop an MPD connection");
    info!("  GET    /api/backends  - List MPD connections");
    info!("  GET    /api/clients   - List WebSocket clients");
    info!("  GET    /ws            - WebSocket for commands and output");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    info!("Closing MPD connections...");
    registry_for_shutdown.shutdown_all().await;

    info!("Shutdown complete");
    server_result
}
