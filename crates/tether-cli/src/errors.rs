//! Error types for the terminal front end.

use std::io;

use thiserror::Error;

use tether_client::ClientError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    /// No port was given and no port file was found.
    #[error(
        "no --port given and no REPL port file (.repl-port, \
         .shadow-cljs/socket-repl.port) found in {dir}"
    )]
    NoPort {
        /// Directory that was searched.
        dir: String,
    },

    /// The client engine reported a failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A local I/O failure (stdin, working directory).
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
}
