//! Command-line argument definitions for the terminal front end.

use clap::Parser;

/// Interactive terminal client for a Clojure socket REPL.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
pub(crate) struct Cli {
    /// Host of the socket REPL server.
    #[arg(long, default_value = "localhost")]
    pub(crate) host: String,

    /// Port of the socket REPL server. When omitted, discovered from a
    /// REPL port file in the working directory.
    #[arg(long)]
    pub(crate) port: Option<u16>,

    /// Seconds to wait for the sub-REPL handshake before giving up.
    #[arg(long, default_value_t = 5)]
    pub(crate) handshake_timeout: u64,

    /// Seconds to wait for each evaluation-context acknowledgement.
    #[arg(long, default_value_t = 5)]
    pub(crate) eval_timeout: u64,
}
