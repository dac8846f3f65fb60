//! Structured logging initialisation for the terminal front end.
//!
//! Diagnostics go to stderr so the REPL transcript on stdout stays clean.
//! Filtering is controlled by the `TETHER_LOG` environment variable.

use std::io;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter expression.
const FILTER_ENV: &str = "TETHER_LOG";

/// Filter applied when the environment does not specify one.
const DEFAULT_FILTER: &str = "warn";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid TETHER_LOG filter: {0}")]
    Filter(String),
    /// The global subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(String),
}

/// Installs the global tracing subscriber on first call.
///
/// Repeated calls are idempotent: only the first invocation touches the
/// global state.
pub(crate) fn init() -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(install_subscriber)
        .map(|_guard| ())
}

fn install_subscriber() -> Result<(), TelemetryError> {
    let filter = match std::env::var(FILTER_ENV) {
        Ok(expression) => EnvFilter::try_new(expression)
            .map_err(|error| TelemetryError::Filter(error.to_string()))?,
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| TelemetryError::Subscriber(error.to_string()))
}
