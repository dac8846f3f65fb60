//! Pending-request table and typed continuations.
//!
//! Every correlated request registers a [`Continuation`] under its id. The
//! backchannel reader loop is the sole dispatcher, so each entry is claimed
//! at most once; a single-shot continuation is invoked exactly once and a
//! rollup continuation is retained until its completion predicate matches.
//! Continuations are invoked outside the table lock, and a panicking
//! continuation is caught and logged so dispatch continues.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::protocol::Response;
use crate::sync::lock;

/// Log target for correlation dispatch.
pub(crate) const CORRELATION_TARGET: &str = "tether_client::correlation";

/// Completion policy for a pending request.
pub enum Continuation {
    /// Resolved and removed on the first matching response.
    SingleShot(Box<dyn FnOnce(Response) + Send>),
    /// Invoked for every matching response, removed once the completion
    /// predicate observes a terminal one.
    Rollup {
        /// Receives each streamed response, the terminal one included.
        handler: Box<dyn FnMut(Response) + Send>,
        /// Decides, per response, whether the stream is complete.
        complete: Box<dyn Fn(&Response) -> bool + Send>,
    },
}

impl Continuation {
    /// A continuation resolved by the first matching response.
    #[must_use]
    pub fn single_shot(handler: impl FnOnce(Response) + Send + 'static) -> Self {
        Self::SingleShot(Box::new(handler))
    }

    /// A continuation retained until `complete` observes a terminal
    /// response.
    #[must_use]
    pub fn rollup(
        handler: impl FnMut(Response) + Send + 'static,
        complete: impl Fn(&Response) -> bool + Send + 'static,
    ) -> Self {
        Self::Rollup {
            handler: Box::new(handler),
            complete: Box::new(complete),
        }
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleShot(_) => formatter.write_str("Continuation::SingleShot"),
            Self::Rollup { .. } => formatter.write_str("Continuation::Rollup"),
        }
    }
}

/// Table of in-flight requests keyed by id.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<i64, Continuation>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a continuation under a request id.
    pub(crate) fn register(&self, id: i64, continuation: Continuation) {
        lock(&self.entries).insert(id, continuation);
    }

    /// Removes and drops the continuation for an id, if still pending.
    pub(crate) fn remove(&self, id: i64) -> Option<Continuation> {
        lock(&self.entries).remove(&id)
    }

    /// Routes a response to its pending continuation.
    ///
    /// Returns the response back when it carries no id or an id with no
    /// pending entry, leaving the caller to route it elsewhere.
    pub(crate) fn dispatch(&self, response: Response) -> Option<Response> {
        let Some(id) = response.id() else {
            return Some(response);
        };
        let Some(continuation) = lock(&self.entries).remove(&id) else {
            return Some(response);
        };
        match continuation {
            Continuation::SingleShot(handler) => {
                invoke(id, move || handler(response));
            }
            Continuation::Rollup {
                mut handler,
                complete,
            } => {
                let done = complete(&response);
                invoke(id, || handler(response));
                if done {
                    debug!(target: CORRELATION_TARGET, id, "rollup complete");
                } else {
                    lock(&self.entries).insert(
                        id,
                        Continuation::Rollup { handler, complete },
                    );
                }
            }
        }
        None
    }

    /// Drops every pending continuation. Rendezvous waiters observe their
    /// channel close and unblock; other continuations simply never fire.
    pub(crate) fn drain(&self) -> usize {
        let mut entries = lock(&self.entries);
        let count = entries.len();
        entries.clear();
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

/// Invokes a continuation, catching panics so a faulty caller-supplied
/// handler cannot terminate the reader loop.
fn invoke(id: i64, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!(
            target: CORRELATION_TARGET,
            id,
            "continuation panicked; dispatch continues"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use tether_edn::{Map, Value};

    use super::*;

    fn response(id: Option<i64>, tag: &str) -> Response {
        let mut map = Map::new();
        if let Some(id) = id {
            map.insert(Value::keyword("id"), Value::Int(id));
        }
        map.insert(Value::keyword("tag"), Value::keyword(tag));
        Response::from(map)
    }

    #[rstest]
    fn single_shot_fires_exactly_once_and_is_removed() {
        let table = PendingTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        table.register(1, Continuation::single_shot(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(table.dispatch(response(Some(1), "ret")).is_none());
        // A second response with the same id no longer matches anything.
        assert!(table.dispatch(response(Some(1), "ret")).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 0);
    }

    #[rstest]
    fn rollup_is_retained_until_the_predicate_matches() {
        let table = PendingTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        table.register(
            2,
            Continuation::rollup(
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                |event| event.tag_name() == Some("ret"),
            ),
        );

        assert!(table.dispatch(response(Some(2), "pass")).is_none());
        assert!(table.dispatch(response(Some(2), "fail")).is_none());
        assert_eq!(table.len(), 1);

        assert!(table.dispatch(response(Some(2), "ret")).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(table.len(), 0);
    }

    #[rstest]
    fn uncorrelated_responses_are_returned_to_the_caller() {
        let table = PendingTable::new();
        assert!(table.dispatch(response(None, "out")).is_some());
        assert!(table.dispatch(response(Some(9), "ret")).is_some());
    }

    #[rstest]
    fn panicking_continuations_do_not_poison_dispatch() {
        let table = PendingTable::new();
        table.register(3, Continuation::single_shot(|_| panic!("handler bug")));
        table.register(4, Continuation::single_shot(|_| {}));

        assert!(table.dispatch(response(Some(3), "ret")).is_none());
        assert!(table.dispatch(response(Some(4), "ret")).is_none());
        assert_eq!(table.len(), 0);
    }
}
