pub mod control;
pub mod health;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use control::{create_backend, destroy_backend, list_backends, list_clients};
pub use health::{health_handler, health_live_handler, metrics_handler};
pub use websocket::websocket_handler;
