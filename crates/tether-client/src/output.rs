//! Classifies evaluation output frames and feeds the printable queue.
//!
//! Every primary-stream frame and every uncorrelated backchannel response
//! ends up here. Frames are rendered to printable text and pushed onto a
//! FIFO queue drained by a single consumer, so evaluation output reaches
//! the presentation layer without cross-thread interleaving.

use std::sync::mpsc::{Receiver, Sender, channel};

use tether_edn::{Value, write};
use tracing::trace;

use crate::protocol::Response;

/// Log target for output routing.
pub(crate) const OUTPUT_TARGET: &str = "tether_client::output";

/// Prefix used when echoing submitted input.
const INPUT_ECHO_PREFIX: &str = "=> ";

/// A printable frame paired with the response it was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFrame {
    /// Text ready to print, already carrying any needed line break.
    pub printable: String,
    /// The response the text was rendered from.
    pub response: Response,
}

/// Renders a response to printable text.
///
/// `out` and `err` frames pass their text through, normalised to end with
/// a line break; `ret` frames get a trailing line break; `in` frames are
/// echoed with a distinguishing prefix. Responses without a recognised
/// shape are serialised whole so nothing silently disappears.
#[must_use]
pub fn printable(response: &Response) -> String {
    match response.tag_name() {
        Some("out" | "err") => {
            let text = response.val().unwrap_or_default();
            if text.ends_with('\n') {
                text.to_owned()
            } else {
                format!("{text}\n")
            }
        }
        Some("ret") => format!("{}\n", response.val().unwrap_or_default()),
        Some("in") => format!("{INPUT_ECHO_PREFIX}{}\n", response.val().unwrap_or_default()),
        _ => match response.get("in").and_then(Value::as_str) {
            Some(input) => format!("{INPUT_ECHO_PREFIX}{input}\n"),
            None => format!("{}\n", write(&Value::Map(response.map().clone()))),
        },
    }
}

/// Producer half of the printable-output queue.
#[derive(Debug, Clone)]
pub(crate) struct OutputRouter {
    sender: Sender<OutputFrame>,
}

impl OutputRouter {
    /// Creates the queue, returning the router and its consumer end.
    pub(crate) fn new() -> (Self, Receiver<OutputFrame>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }

    /// Renders and enqueues one response. Delivery failure only happens
    /// once the consumer is gone, at which point output is moot.
    pub(crate) fn route(&self, response: Response) {
        let frame = OutputFrame {
            printable: printable(&response),
            response,
        };
        trace!(target: OUTPUT_TARGET, printable = %frame.printable, "routing frame");
        let _ = self.sender.send(frame);
    }
}
