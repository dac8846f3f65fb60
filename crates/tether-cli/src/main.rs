//! Binary entrypoint for the `tether` terminal REPL front end.
//!
//! The binary delegates to [`tether_cli::run`], which parses arguments,
//! installs telemetry, connects to the socket REPL, and drives the
//! read-evaluate loop against the client engine.

use std::process::ExitCode;

fn main() -> ExitCode {
    tether_cli::run(std::env::args_os())
}
