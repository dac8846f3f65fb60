//! Socket REPL client engine for live Clojure(Script) processes.
//!
//! The crate drives a remote process over two TCP connections: the
//! primary socket, a bare line-oriented REPL carrying raw code in and
//! printed frames out, and a structured backchannel bootstrapped during
//! [`Client::connect`]. It correlates asynchronous requests with
//! responses, performs the context-then-code two-phase evaluation
//! protocol, and routes evaluation output onto a FIFO queue for a single
//! presentation consumer.
//!
//! The engine deliberately does not evaluate code, navigate to files, or
//! retry failed requests; those concerns belong to the embedding tool.

mod client;
mod correlation;
mod errors;
mod handshake;
mod location;
pub mod ops;
mod output;
mod protocol;
mod registry;
mod session;
mod sync;
mod transport;

pub use client::{
    Client, ClientOptions, ClientState, EvalOptions, NO_SOURCE_FILE, Timeouts,
};
pub use correlation::Continuation;
pub use errors::{ClientError, StreamKind};
pub use location::{Location, parse_location};
pub use output::{OutputFrame, printable};
pub use protocol::Response;
pub use registry::{OwnerId, Registry};
pub use session::{Dialect, Session, SessionOptions};

#[cfg(test)]
mod tests;
