//! Discovers a REPL port from conventional port files.
//!
//! Tools that start a socket REPL commonly write the chosen port next to
//! the project so editors can find it without asking.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Log target for port discovery.
const PORTS_TARGET: &str = "tether_cli::ports";

/// Port files checked, in order of preference.
const PORT_FILES: [&str; 2] = [".repl-port", ".shadow-cljs/socket-repl.port"];

/// Finds the first readable port file under `dir`.
///
/// Returns the file it came from alongside the port, so the caller can
/// name the source when reporting where the connection went.
pub(crate) fn discover(dir: &Path) -> Option<(PathBuf, u16)> {
    for name in PORT_FILES {
        let path = dir.join(name);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        match content.trim().parse::<u16>() {
            Ok(port) => {
                debug!(target: PORTS_TARGET, path = %path.display(), port, "discovered port file");
                return Some((path, port));
            }
            Err(_) => {
                debug!(
                    target: PORTS_TARGET,
                    path = %path.display(),
                    "ignoring unparsable port file"
                );
            }
        }
    }
    None
}
