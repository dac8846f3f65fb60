//! Error types surfaced by the REPL client engine.
//!
//! The taxonomy mirrors how failures are handled: connection and handshake
//! failures surface immediately to the caller and are never retried by the
//! engine; malformed stream data is fatal to that connection; errors raised
//! inside caller-supplied continuations are caught and logged without
//! terminating the reader loops.

use std::io;

use thiserror::Error;

use tether_edn::ReadError;

/// Identifies which of the two sockets an error originated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StreamKind {
    /// The bare socket REPL connection carrying raw code and printed text.
    Primary,
    /// The structured request/response side channel.
    Backchannel,
}

/// Errors returned by [`crate::Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Opening a socket failed; surfaced immediately, never retried.
    #[error("connection to {host}:{port} failed: {source}")]
    Connect {
        /// Host the connection was attempted against.
        host: String,
        /// Port the connection was attempted against.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The sub-REPL bootstrap did not answer in time. The remote most
    /// likely speaks an incompatible protocol (for example nREPL).
    #[error(
        "timed out after {timeout_secs}s waiting for the sub-REPL handshake; \
         the remote may not speak the socket REPL protocol"
    )]
    HandshakeTimeout {
        /// The handshake deadline that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// Malformed data arrived on a stream. A corrupted stream cannot be
    /// resynchronised, so this is fatal to the connection.
    #[error("malformed data on the {stream} stream: {source}")]
    Protocol {
        /// The stream that produced the malformed data.
        stream: StreamKind,
        /// The underlying codec error.
        #[source]
        source: ReadError,
    },

    /// An I/O failure on an established stream.
    #[error("I/O failure on the {stream} stream: {source}")]
    Io {
        /// The stream the failure occurred on.
        stream: StreamKind,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The evaluation-context rendezvous deadline elapsed before the
    /// remote acknowledged. No code was transmitted.
    #[error("timed out after {timeout_secs}s waiting for the evaluation context acknowledgement")]
    ContextTimeout {
        /// The rendezvous deadline that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// The client has been halted; no further requests are accepted.
    #[error("the client is closed")]
    Closed,
}

impl ClientError {
    /// Wraps a socket-open failure.
    pub(crate) fn connect(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Connect {
            host: host.into(),
            port,
            source,
        }
    }

    /// Wraps an I/O failure on an established stream.
    pub(crate) fn io(stream: StreamKind, source: io::Error) -> Self {
        Self::Io { stream, source }
    }
}
