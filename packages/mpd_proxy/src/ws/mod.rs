//! WebSocket surface: clients send commands for any backend and receive the
//! raw output of every backend.

mod handler;
mod protocol;

pub use handler::handle_client;
pub use protocol::ClientCommand;
