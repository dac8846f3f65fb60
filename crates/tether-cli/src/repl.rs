//! The interactive read-evaluate loop.
//!
//! Stdin lines are echoed into the transcript and evaluated; a dedicated
//! printer thread drains the client's output queue onto stdout, making it
//! the sole writer of evaluation output. End of input halts the client,
//! which in turn closes the output queue and ends the printer.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use tether_client::{Client, ClientError, ClientOptions, Timeouts};

use crate::cli::Cli;
use crate::errors::AppError;
use crate::ports;

/// Log target for the REPL loop.
const REPL_TARGET: &str = "tether_cli::repl";

pub(crate) fn run(cli: &Cli) -> Result<(), AppError> {
    let port = resolve_port(cli)?;
    let options = ClientOptions {
        host: cli.host.clone(),
        port,
        timeouts: Timeouts {
            handshake: Duration::from_secs(cli.handshake_timeout),
            eval_context: Duration::from_secs(cli.eval_timeout),
            ..Timeouts::default()
        },
    };

    let client = Client::connect(options)?;
    info!(target: REPL_TARGET, host = %cli.host, port, "connected");

    let printer = client.take_output().map(|output| {
        thread::spawn(move || {
            let mut stdout = io::stdout().lock();
            for frame in output {
                let _ = stdout.write_all(frame.printable.as_bytes());
                let _ = stdout.flush();
            }
        })
    });

    let outcome = read_eval_loop(&client);

    client.halt();
    if let Some(printer) = printer {
        let _ = printer.join();
    }
    outcome
}

fn read_eval_loop(client: &Client) -> Result<(), AppError> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        let read = stdin.lock().read_line(&mut line).map_err(AppError::Io)?;
        if read == 0 {
            // End of input: the session is over.
            return Ok(());
        }
        let code = line.trim();
        if code.is_empty() {
            continue;
        }

        client.echo_input(code);
        match client.eval(code) {
            Ok(()) => {}
            Err(error @ ClientError::ContextTimeout { .. }) => {
                // The remote may be busy with a long evaluation; the line
                // was not transmitted, so the caller can retry or
                // interrupt.
                warn!(target: REPL_TARGET, error = %error, "evaluation context not acknowledged");
            }
            Err(error) => return Err(error.into()),
        }
    }
}

fn resolve_port(cli: &Cli) -> Result<u16, AppError> {
    if let Some(port) = cli.port {
        return Ok(port);
    }
    let dir = std::env::current_dir().map_err(AppError::Io)?;
    match ports::discover(&dir) {
        Some((path, port)) => {
            info!(target: REPL_TARGET, path = %path.display(), port, "using discovered port");
            Ok(port)
        }
        None => Err(AppError::NoPort {
            dir: dir.display().to_string(),
        }),
    }
}
