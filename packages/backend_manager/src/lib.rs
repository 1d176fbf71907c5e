//! Backend Manager - connection lifecycle for line-protocol music servers
//!
//! This crate owns the TCP sessions to MPD-style backends. It knows about the
//! line protocol (newline-terminated commands, `OK`/`ACK` terminated replies,
//! the `password` command) but nothing about HTTP or WebSockets.
//!
//! # Example
//!
//! ```no_run
//! use backend_manager::{BackendEvent, BackendId, BackendOptions, BackendRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = BackendRegistry::new(BackendOptions::default());
//!     let id: BackendId = "127.0.0.1:6600".parse().unwrap();
//!
//!     let backend = registry.ensure(id, None).await.into_handle();
//!     let mut events = backend.subscribe();
//!
//!     backend.send("status").await.unwrap();
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             BackendEvent::Message { data, .. } => print!("{}", data),
//!             BackendEvent::Closed { id, .. } => {
//!                 println!("{} closed", id);
//!                 break;
//!             }
//!         }
//!     }
//! }
//! ```

mod connection;
mod error;
mod framing;
mod id;
mod registry;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use connection::{
    AuthState, BackendConfig, BackendEvent, BackendHandle, BackendSnapshot, ConnectionStatus,
    ConnectivityState, CorrelatedReplies,
};
pub use error::BackendError;
pub use framing::ReplyFramer;
pub use id::BackendId;
pub use registry::{BackendOptions, BackendRegistry, Ensured};
