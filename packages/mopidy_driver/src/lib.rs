//! Mopidy Driver - JSON-RPC over WebSocket with reply correlation
//!
//! Mopidy answers requests in order but every request goes out with the same
//! id, and core events arrive on the same socket. Each [`Driver`] pairs
//! responses with the requests that produced them using the `correlator`
//! crate and merges them with the events of its scope.
//!
//! ```no_run
//! use futures::StreamExt;
//! use mopidy_driver::{MopidySession, mixer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mopidy_driver::MopidyError> {
//!     let session = MopidySession::connect("ws://localhost:6680/mopidy/ws").await?;
//!     let mixer = mixer::driver(session);
//!     let mut data = mixer.data();
//!
//!     mixer.send(mixer::get_volume())?;
//!     if let Some(item) = data.next().await {
//!         println!("{:?}", item?);
//!     }
//!     Ok(())
//! }
//! ```

mod close;
mod driver;
mod error;
mod message;
mod request;
mod session;

pub mod mixer;
pub mod playback;
pub mod tracklist;

pub use close::{CloseCode, WEBSOCKET_CLOSED, classify_close};
pub use driver::{Driver, DriverData};
pub use error::MopidyError;
pub use message::MopidyMessage;
pub use request::{Request, Scope};
pub use session::{MessageResult, MopidySession};
