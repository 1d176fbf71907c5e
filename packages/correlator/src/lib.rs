//! Correlator - pair replies with the commands that caused them
//!
//! Some protocols interleave unsolicited notifications with command replies on
//! a single channel and carry no request id. When the remote side answers in
//! submission order, replies can still be matched to commands by position:
//! every reply takes the oldest pending command, and a reply that arrives with
//! nothing pending takes a caller-supplied default.
//!
//! The pairing cannot tell a notification apart from a genuine reply, so
//! callers filter the paired stream with a predicate of their own
//! (see [`correlate`]).
//!
//! # Example
//!
//! ```
//! use correlator::{Paired, zip_one_way_with_default};
//! use futures::{StreamExt, executor::block_on, stream};
//!
//! let commands = stream::iter(vec![Ok::<_, ()>("play"), Ok("status")]);
//! let replies = stream::iter(vec!["M1", "M2", "M3"]);
//!
//! let pairs: Vec<_> = block_on(
//!     zip_one_way_with_default(replies, commands, "none").collect::<Vec<_>>(),
//! );
//!
//! let pairs: Vec<Paired<_, _>> = pairs.into_iter().map(Result::unwrap).collect();
//! assert_eq!(pairs[0], Paired::new("M1", "play"));
//! assert_eq!(pairs[1], Paired::new("M2", "status"));
//! assert_eq!(pairs[2], Paired::new("M3", "none"));
//! ```

mod error;
mod queue;
mod zip;

pub use error::CorrelationError;
pub use queue::PendingCommandQueue;
pub use zip::{Correlated, Paired, ZipOneWay, correlate, zip_one_way_with_default};
