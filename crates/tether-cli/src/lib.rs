//! Terminal front end for the socket REPL client engine.
//!
//! Owns argument parsing, telemetry bootstrapping, port discovery, and the
//! interactive read-evaluate loop. The engine itself lives in
//! `tether-client`; this crate is the presentation collaborator consuming
//! its printable output frames.

use std::ffi::OsString;
use std::process::ExitCode;

use clap::Parser;

mod cli;
mod errors;
mod ports;
mod repl;
mod telemetry;

use cli::Cli;

/// Parses arguments, connects, and runs the interactive loop.
///
/// Returns a failure exit code on connection, handshake, or I/O errors;
/// diagnostics go to stderr.
pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            // Clap renders its own help/usage output.
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(error) = telemetry::init() {
        eprintln!("tether: {error}");
        return ExitCode::FAILURE;
    }

    match repl::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("tether: {error}");
            ExitCode::FAILURE
        }
    }
}
