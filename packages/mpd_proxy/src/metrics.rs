//! Server metrics for observability

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Client metrics
    /// Currently attached WebSocket clients
    pub active_connections: AtomicU64,
    /// Total clients since server start
    pub total_connections: AtomicU64,

    // Backend metrics
    /// Backend connections created since server start
    pub backends_created: AtomicU64,
    /// Backend connections destroyed via the control surface
    pub backends_destroyed: AtomicU64,

    // Message metrics
    /// Command messages received from clients
    pub commands_received: AtomicU64,
    /// Backend messages fanned out (counted once per client delivery)
    pub messages_delivered: AtomicU64,
    /// Deliveries skipped because a client's outbound channel was full
    pub messages_dropped: AtomicU64,

    // Error metrics
    /// Connect and write failures reported by backends
    pub backend_errors: AtomicU64,
    /// Malformed client messages and socket failures
    pub websocket_errors: AtomicU64,

    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn backend_created(&self) {
        self.backends_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_destroyed(&self) {
        self.backends_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_broadcast(&self, delivered: usize, dropped: usize) {
        self.messages_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.messages_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub fn backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            backends: BackendMetrics {
                created: self.backends_created.load(Ordering::Relaxed),
                destroyed: self.backends_destroyed.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                commands_received: self.commands_received.load(Ordering::Relaxed),
                delivered: self.messages_delivered.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                backend: self.backend_errors.load(Ordering::Relaxed),
                websocket: self.websocket_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub backends: BackendMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendMetrics {
    pub created: u64,
    pub destroyed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub commands_received: u64,
    pub delivered: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub backend: u64,
    pub websocket: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub backends: BackendHealth,
    pub clients: u64,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub total: u64,
    pub connected: u64,
}
