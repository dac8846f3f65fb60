//! Multi-step bootstrap of the sub-REPL and its backchannel.
//!
//! The primary socket only understands raw code text, so the bootstrap
//! starts by transmitting a self-decoding loader for the embedded runtime
//! bootstrap source as plain text. The loaded code opens the backchannel
//! listener and prints its address back on the primary stream as a single
//! `:ret`-tagged frame, which is the one structured message the engine
//! ever waits for synchronously on that stream.

use std::io;
use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::debug;

use tether_edn::{Value, read_str};

use crate::errors::{ClientError, StreamKind};
use crate::protocol::Response;
use crate::transport::ValueStream;

/// Log target for the bootstrap sequence.
pub(crate) const HANDSHAKE_TARGET: &str = "tether_client::handshake";

/// The sub-REPL bootstrap source, transmitted first as plain text.
const BOOT_SOURCE: &str = include_str!("runtime/repl.clj");

/// Remote-side sources uploaded over the backchannel, in upload order.
pub(crate) const RUNTIME_BUNDLE: [(&str, &str); 6] = [
    ("lookup.clj", include_str!("runtime/lookup.clj")),
    ("completions.clj", include_str!("runtime/completions.clj")),
    ("load_blob.clj", include_str!("runtime/load_blob.clj")),
    ("test.clj", include_str!("runtime/test.clj")),
    ("cljs.clj", include_str!("runtime/cljs.clj")),
    ("shadow.clj", include_str!("runtime/shadow.clj")),
];

/// Fixed payload confirming liveliness and capturing the interpreter
/// version text after the backchannel is up.
pub(crate) const PRINT_VERSION_PAYLOAD: &str = "(println \"Clojure\" (clojure-version))";

/// Fixed payload probing whether the remote can host ClojureScript.
pub(crate) const CLJS_PROBE_PAYLOAD: &str =
    "(some? (try (requiring-resolve 'cljs.analyzer.api/empty-state) (catch Throwable _ nil)))";

/// Builds the plain-text loader that boots the sub-REPL.
///
/// The source travels base64-encoded inside a `load-string` form so that
/// newlines and quoting survive the bare line-oriented REPL unharmed.
pub(crate) fn boot_payload() -> String {
    let encoded = STANDARD.encode(BOOT_SOURCE);
    format!(
        "(clojure.core/load-string (new String (.decode (java.util.Base64/getDecoder) \"{encoded}\") \"UTF-8\"))\n"
    )
}

/// Encodes one bundle file for a `load-base64` request.
pub(crate) fn encode_content(source: &str) -> String {
    STANDARD.encode(source)
}

/// Scans the primary stream for the backchannel address frame.
///
/// Anything else the remote prints first (greeting text, prompts) decodes
/// as harmless values and is skipped. The caller is expected to have set a
/// read timeout on the socket; both that timeout and the overall deadline
/// surface as [`ClientError::HandshakeTimeout`].
pub(crate) fn await_backchannel_address(
    primary: &mut ValueStream,
    timeout: Duration,
) -> Result<(String, u16), ClientError> {
    let deadline = Instant::now() + timeout;
    let timeout_error = || ClientError::HandshakeTimeout {
        timeout_secs: timeout.as_secs(),
    };
    loop {
        match primary.next_value() {
            Ok(Some(Value::Map(map))) => {
                if let Some(address) = decode_address(&Response::from(map)) {
                    debug!(
                        target: HANDSHAKE_TARGET,
                        host = %address.0,
                        port = address.1,
                        "backchannel announced"
                    );
                    return Ok(address);
                }
            }
            Ok(Some(other)) => {
                debug!(target: HANDSHAKE_TARGET, value = %other, "skipping greeting output");
            }
            Ok(None) => {
                return Err(ClientError::io(
                    StreamKind::Primary,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed during handshake",
                    ),
                ));
            }
            Err(ClientError::Io { source, .. })
                if matches!(
                    source.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Err(timeout_error());
            }
            Err(error) => return Err(error),
        }
        if Instant::now() >= deadline {
            return Err(timeout_error());
        }
    }
}

/// Decodes `{:tag :ret, :val "{:host ..., :port ...}"}` into an address.
fn decode_address(frame: &Response) -> Option<(String, u16)> {
    if frame.tag_name() != Some("ret") {
        return None;
    }
    let printed = frame.val()?;
    let value = read_str(printed).ok()?;
    let map = value.as_map()?;
    let host = map.get_keyword("host")?.as_str()?.to_owned();
    let port = u16::try_from(map.get_keyword("port")?.as_int()?).ok()?;
    Some((host, port))
}
