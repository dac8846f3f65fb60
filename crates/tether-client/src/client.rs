//! The socket REPL client: lifecycle, correlation, and output routing.
//!
//! A [`Client`] owns two sockets. The primary stream is the bare REPL the
//! remote process exposes: raw code text goes in, printed frames come out.
//! The backchannel is bootstrapped during [`Client::connect`] and carries
//! structured request/response traffic. Two background reader threads, one
//! per socket, are the sole producers into the pending-request table, the
//! inbound dispatch queue, and the printable-output queue.
//!
//! Every operation is asynchronous with continuation-based completion,
//! with one exception: the context-setting phase of [`Client::eval`]
//! blocks the calling thread, bounded by a deadline. Cancellation is
//! cooperative; [`Client::halt`] is idempotent, callable from any thread,
//! and guarantees that no reader loop or blocked queue consumer outlives
//! it.

use std::collections::VecDeque;
use std::fmt;
use std::net::TcpStream;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use tether_edn::{Keyword, Map, Value, read_str, write};

use crate::correlation::{Continuation, PendingTable};
use crate::errors::{ClientError, StreamKind};
use crate::handshake;
use crate::ops;
use crate::output::{OutputFrame, OutputRouter};
use crate::protocol::{IdGenerator, Response};
use crate::session::{Dialect, Session};
use crate::sync::lock;
use crate::transport::{self, ValueStream};

/// Log target for client lifecycle and dispatch.
pub(crate) const CLIENT_TARGET: &str = "tether_client::client";

/// File attributed to evaluations without a source file.
pub const NO_SOURCE_FILE: &str = "NO_SOURCE_FILE";

/// Lifecycle states of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ClientState {
    /// Constructed, not yet connecting.
    New,
    /// Opening the primary socket.
    Connecting,
    /// Bootstrapping the sub-REPL and backchannel.
    Handshaking,
    /// Connected and accepting operations.
    Ready,
    /// Blocked in the evaluation-context rendezvous.
    Evaluating,
    /// Halt in progress.
    Closing,
    /// Terminal: both sockets closed.
    Closed,
}

/// Deadlines applied to the blocking phases of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Socket-open deadline, per socket.
    pub connect: Duration,
    /// Deadline for the backchannel address to appear on the primary
    /// stream.
    pub handshake: Duration,
    /// Deadline for the `set-eval-context` acknowledgement.
    pub eval_context: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            handshake: Duration::from_secs(5),
            eval_context: Duration::from_secs(5),
        }
    }
}

/// Connection parameters for [`Client::connect`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Host of the socket REPL.
    pub host: String,
    /// Port of the socket REPL.
    pub port: u16,
    /// Deadlines for the blocking protocol phases.
    pub timeouts: Timeouts,
}

impl ClientOptions {
    /// Options for an address with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeouts: Timeouts::default(),
        }
    }
}

/// Source position attributed to an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
    /// Originating file, when known.
    pub file: Option<String>,
    /// One-based line of the evaluated form.
    pub line: u32,
    /// One-based column of the evaluated form.
    pub column: u32,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            file: None,
            line: 1,
            column: 1,
        }
    }
}

/// What to do with the next `:ret`-tagged primary-stream frame.
enum EvalSlot {
    /// Route it to the output queue like any other frame.
    Route,
    /// Hand it to the continuation supplied with the evaluation.
    Continue(Box<dyn FnOnce(Response) + Send>),
}

impl fmt::Debug for EvalSlot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route => formatter.write_str("EvalSlot::Route"),
            Self::Continue(_) => formatter.write_str("EvalSlot::Continue"),
        }
    }
}

#[derive(Debug)]
struct Shared {
    timeouts: Timeouts,
    session: Mutex<Session>,
    state: Mutex<ClientState>,
    pending: PendingTable,
    ids: IdGenerator,
    eval_slots: Mutex<VecDeque<EvalSlot>>,
    primary: Mutex<Option<TcpStream>>,
    backchannel: Mutex<Option<TcpStream>>,
    dispatch: Mutex<Option<Sender<Response>>>,
    output: Mutex<Option<Receiver<OutputFrame>>>,
    /// Serialises context-setting exchanges: only one namespace/dialect
    /// switch may be in flight per session.
    context_gate: Mutex<()>,
    halted: AtomicBool,
}

/// Handle to one live REPL connection. Cheap to clone; all clones share
/// the same session.
#[derive(Debug, Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Connects to a socket REPL and bootstraps the backchannel.
    ///
    /// Blocks through the handshake: transmits the sub-REPL loader, waits
    /// (bounded by the handshake deadline) for the backchannel address to
    /// appear on the primary stream, connects the backchannel, uploads the
    /// runtime bundle, and sends the version probe. On success the client
    /// is ready and its reader loops are running.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connect`] when a socket cannot be opened — surfaced
    /// immediately, never retried. [`ClientError::HandshakeTimeout`] when
    /// the address frame does not appear in time, which commonly means the
    /// remote speaks an incompatible protocol.
    pub fn connect(options: ClientOptions) -> Result<Self, ClientError> {
        let client = Self {
            shared: Arc::new(Shared {
                timeouts: options.timeouts,
                session: Mutex::new(Session::new(options.host.clone(), options.port)),
                state: Mutex::new(ClientState::New),
                pending: PendingTable::new(),
                ids: IdGenerator::new(),
                eval_slots: Mutex::new(VecDeque::new()),
                primary: Mutex::new(None),
                backchannel: Mutex::new(None),
                dispatch: Mutex::new(None),
                output: Mutex::new(None),
                context_gate: Mutex::new(()),
                halted: AtomicBool::new(false),
            }),
        };

        client.set_state(ClientState::Connecting);
        let primary =
            match transport::connect_tcp(&options.host, options.port, options.timeouts.connect) {
                Ok(stream) => stream,
                Err(error) => {
                    client.set_state_forced(ClientState::Closed);
                    return Err(error);
                }
            };

        match client.bootstrap(primary) {
            Ok(()) => Ok(client),
            Err(error) => {
                client.halt();
                Err(error)
            }
        }
    }

    /// Drives the multi-phase handshake over an open primary socket.
    fn bootstrap(&self, primary: TcpStream) -> Result<(), ClientError> {
        let timeouts = self.shared.timeouts;
        primary
            .set_read_timeout(Some(timeouts.handshake))
            .map_err(|source| ClientError::io(StreamKind::Primary, source))?;
        let reader = primary
            .try_clone()
            .map_err(|source| ClientError::io(StreamKind::Primary, source))?;
        let mut primary_stream = ValueStream::new(reader, StreamKind::Primary);
        *lock(&self.shared.primary) = Some(primary);

        self.set_state(ClientState::Handshaking);
        self.write_primary(&handshake::boot_payload())?;
        let (backhost, backport) =
            handshake::await_backchannel_address(&mut primary_stream, timeouts.handshake)?;

        let backchannel = transport::connect_tcp(&backhost, backport, timeouts.connect)?;
        let backchannel_reader = backchannel
            .try_clone()
            .map_err(|source| ClientError::io(StreamKind::Backchannel, source))?;
        lock(&self.shared.session).backchannel = Some((backhost, backport));
        *lock(&self.shared.backchannel) = Some(backchannel);

        // The handshake deadline no longer applies; reads now block until
        // the remote prints or the socket closes.
        if let Some(stream) = lock(&self.shared.primary).as_ref() {
            stream
                .set_read_timeout(None)
                .map_err(|source| ClientError::io(StreamKind::Primary, source))?;
        }

        for (filename, source) in handshake::RUNTIME_BUNDLE {
            let request = ops::load_base64(filename, &handshake::encode_content(source));
            self.send_with(
                request,
                Continuation::single_shot(move |response| {
                    debug!(
                        target: CLIENT_TARGET,
                        filename,
                        result = ?response.get("result"),
                        "runtime source loaded"
                    );
                }),
            )?;
        }

        self.write_primary(&format!("{}\n", handshake::PRINT_VERSION_PAYLOAD))?;

        self.set_state(ClientState::Ready);
        self.spawn_loops(
            primary_stream,
            ValueStream::new(backchannel_reader, StreamKind::Backchannel),
        );
        Ok(())
    }

    fn spawn_loops(&self, primary_stream: ValueStream, backchannel_stream: ValueStream) {
        let (router, output_frames) = OutputRouter::new();
        let (dispatch_tx, dispatch_rx) = mpsc::channel();
        *lock(&self.shared.dispatch) = Some(dispatch_tx.clone());
        *lock(&self.shared.output) = Some(output_frames);

        let shared = Arc::clone(&self.shared);
        let primary_router = router.clone();
        thread::spawn(move || primary_loop(&shared, primary_stream, &primary_router));

        let shared = Arc::clone(&self.shared);
        thread::spawn(move || backchannel_loop(&shared, backchannel_stream, &dispatch_tx));

        thread::spawn(move || {
            for response in dispatch_rx {
                router.route(response);
            }
            debug!(target: CLIENT_TARGET, "dispatch router loop exited");
        });
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        *lock(&self.shared.state)
    }

    /// A snapshot of the session.
    #[must_use]
    pub fn session(&self) -> Session {
        lock(&self.shared.session).clone()
    }

    /// The namespace evaluations are currently attributed to.
    #[must_use]
    pub fn namespace(&self) -> String {
        lock(&self.shared.session).namespace.clone()
    }

    /// Takes the consumer end of the printable-output queue.
    ///
    /// There is exactly one: a single consumer loop draining it in FIFO
    /// order is the only writer of evaluation output, which is what keeps
    /// frames from interleaving at the presentation boundary.
    #[must_use]
    pub fn take_output(&self) -> Option<Receiver<OutputFrame>> {
        lock(&self.shared.output).take()
    }

    /// Sends a request on the backchannel, dropping any eventual response.
    ///
    /// # Errors
    ///
    /// Fails when the client is closed or the backchannel write fails.
    pub fn send(&self, request: Map) -> Result<i64, ClientError> {
        self.transmit(request, None)
    }

    /// Sends a request on the backchannel with a continuation registered
    /// under its id.
    ///
    /// # Errors
    ///
    /// Fails when the client is closed or the backchannel write fails; the
    /// continuation is unregistered again on failure.
    pub fn send_with(
        &self,
        request: Map,
        continuation: Continuation,
    ) -> Result<i64, ClientError> {
        self.transmit(request, Some(continuation))
    }

    fn transmit(
        &self,
        mut request: Map,
        continuation: Option<Continuation>,
    ) -> Result<i64, ClientError> {
        self.ensure_open()?;
        let id = match request.get_keyword("id").and_then(Value::as_int) {
            Some(existing) => existing,
            None => {
                let id = self.shared.ids.next();
                request.insert(Value::keyword("id"), Value::Int(id));
                id
            }
        };
        let registered = continuation.is_some();
        if let Some(continuation) = continuation {
            self.shared.pending.register(id, continuation);
        }
        let mut text = write(&Value::Map(request));
        text.push('\n');
        let outcome = self.write_backchannel(&text);
        if outcome.is_err() && registered {
            self.shared.pending.remove(id);
        }
        outcome.map(|()| id)
    }

    /// Evaluates code in the current namespace, routing the result to the
    /// output queue.
    ///
    /// # Errors
    ///
    /// See [`Client::eval_with`].
    pub fn eval(&self, code: &str) -> Result<(), ClientError> {
        self.eval_with(code, EvalOptions::default(), None)
    }

    /// Evaluates code with an explicit source position and an optional
    /// continuation for the result frame.
    ///
    /// Two phases: a `set-eval-context` request is sent on the backchannel
    /// and the calling thread blocks until its acknowledgement — the
    /// engine's one synchronous rendezvous — and only then is the raw code
    /// written to the primary stream. The continuation is associated with
    /// the next `:ret`-tagged primary frame, not with the context request:
    /// context setting exists solely so the remote attaches correct
    /// metadata to the plain-text evaluation that follows.
    ///
    /// # Errors
    ///
    /// [`ClientError::ContextTimeout`] when the acknowledgement does not
    /// arrive in time; no code is transmitted in that case.
    pub fn eval_with(
        &self,
        code: &str,
        options: EvalOptions,
        continuation: Option<Box<dyn FnOnce(Response) + Send>>,
    ) -> Result<(), ClientError> {
        self.ensure_open()?;
        let gate = lock(&self.shared.context_gate);
        self.set_state(ClientState::Evaluating);

        let outcome = self.rendezvous_eval_context(&options).and_then(|_ack| {
            let slot = match continuation {
                Some(handler) => EvalSlot::Continue(handler),
                None => EvalSlot::Route,
            };
            lock(&self.shared.eval_slots).push_back(slot);
            let written = self.write_primary(&format!("{code}\n"));
            if written.is_err() {
                lock(&self.shared.eval_slots).pop_back();
            }
            written
        });

        self.set_state(ClientState::Ready);
        drop(gate);
        outcome
    }

    /// Switches the session namespace and dialect.
    ///
    /// The session is updated optimistically before the synchronous
    /// context exchange; on failure nothing is rolled back. A caller that
    /// needs the previous namespace restored wraps the scoped work in its
    /// own compensation (switch back in a `finally`-style block).
    ///
    /// # Errors
    ///
    /// [`ClientError::ContextTimeout`] when the remote does not
    /// acknowledge in time.
    pub fn switch_namespace(&self, namespace: &str, dialect: Dialect) -> Result<(), ClientError> {
        self.ensure_open()?;
        let _gate = lock(&self.shared.context_gate);
        {
            let mut session = lock(&self.shared.session);
            session.namespace = namespace.to_owned();
            session.dialect = dialect;
        }
        self.rendezvous_eval_context(&EvalOptions::default())
            .map(|_ack| ())
    }

    fn rendezvous_eval_context(&self, options: &EvalOptions) -> Result<Response, ClientError> {
        let namespace = self.namespace();
        let file = options.file.as_deref().unwrap_or(NO_SOURCE_FILE);
        let id = self.shared.ids.next();
        let request = ops::set_eval_context(id, file, &namespace, options.line, options.column);

        let (ack_tx, ack_rx) = mpsc::sync_channel::<Response>(1);
        self.send_with(
            request,
            Continuation::single_shot(move |response| {
                let _ = ack_tx.send(response);
            }),
        )?;

        match ack_rx.recv_timeout(self.shared.timeouts.eval_context) {
            Ok(ack) => Ok(ack),
            Err(RecvTimeoutError::Timeout) => {
                self.shared.pending.remove(id);
                Err(ClientError::ContextTimeout {
                    timeout_secs: self.shared.timeouts.eval_context.as_secs(),
                })
            }
            // The pending table was drained by a halt; the wait ends
            // without the continuation ever firing.
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Closed),
        }
    }

    /// Requests completion candidates for a prefix.
    ///
    /// # Errors
    ///
    /// Fails when the client is closed or the backchannel write fails.
    pub fn completions(
        &self,
        prefix: &str,
        namespace: Option<&str>,
        handler: impl FnOnce(Response) + Send + 'static,
    ) -> Result<i64, ClientError> {
        let dialect = lock(&self.shared.session).dialect;
        self.send_with(
            ops::completions(prefix, namespace, dialect),
            Continuation::single_shot(handler),
        )
    }

    /// Requests metadata for a named var or keyword.
    ///
    /// # Errors
    ///
    /// Fails when the client is closed or the backchannel write fails.
    pub fn lookup(
        &self,
        named: &str,
        namespace: Option<&str>,
        handler: impl FnOnce(Response) + Send + 'static,
    ) -> Result<i64, ClientError> {
        let dialect = lock(&self.shared.session).dialect;
        self.send_with(
            ops::lookup(named, namespace, dialect),
            Continuation::single_shot(handler),
        )
    }

    /// Asks the remote to abort the in-flight evaluation.
    ///
    /// Cooperative, not preemptive: a blocked local caller is released
    /// only when the remote eventually emits a terminating frame, or when
    /// [`Client::halt`] closes the sockets.
    ///
    /// # Errors
    ///
    /// Fails when the client is closed or the backchannel write fails.
    pub fn interrupt(&self) -> Result<(), ClientError> {
        self.send(ops::interrupt()).map(|_id| ())
    }

    /// Runs tests in a namespace, streaming each event to `on_event`.
    ///
    /// The continuation is registered with a rollup policy: it stays
    /// registered across the streamed event responses and is removed once
    /// the `:ret`-tagged summary arrives.
    ///
    /// # Errors
    ///
    /// Fails when the client is closed or the backchannel write fails.
    pub fn run_tests(
        &self,
        namespace: &str,
        vars: &[&str],
        on_event: impl FnMut(Response) + Send + 'static,
    ) -> Result<i64, ClientError> {
        self.send_with(
            ops::run_tests(namespace, vars),
            Continuation::rollup(on_event, |event| event.tag_name() == Some("ret")),
        )
    }

    /// Negotiates ClojureScript support.
    ///
    /// Probes the remote first; when it is capable, sends the
    /// `initialize-cljs` op and hands the offered shadow-cljs build ids to
    /// `choose`. The chosen id is stored in the session options, where
    /// later ClojureScript operations consult it. With several ids on
    /// offer the selection is entirely the caller's.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors from the capability probe.
    pub fn initialize_cljs(
        &self,
        choose: impl FnOnce(Vec<Keyword>) -> Option<Keyword> + Send + 'static,
    ) -> Result<(), ClientError> {
        self.ensure_open()?;
        let client = self.clone();
        self.eval_with(
            handshake::CLJS_PROBE_PAYLOAD,
            EvalOptions::default(),
            Some(Box::new(move |response: Response| {
                let capable = response
                    .val()
                    .is_some_and(|val| read_str(val).map(|v| !v.is_falsey()).unwrap_or(false));
                if !capable {
                    debug!(target: CLIENT_TARGET, "remote offers no ClojureScript support");
                    return;
                }
                let negotiator = client.clone();
                let sent = client.send_with(
                    ops::initialize_cljs(),
                    Continuation::single_shot(move |response| {
                        let build_ids: Vec<Keyword> = response
                            .get_qualified("shadow", "build-ids")
                            .and_then(Value::as_seq)
                            .map(|items| {
                                items
                                    .iter()
                                    .filter_map(|item| item.as_keyword().cloned())
                                    .collect()
                            })
                            .unwrap_or_default();
                        if let Some(chosen) = choose(build_ids) {
                            debug!(
                                target: CLIENT_TARGET,
                                build_id = %chosen,
                                "shadow-cljs build selected"
                            );
                            lock(&negotiator.shared.session).options.shadow_build_id =
                                Some(chosen);
                        }
                    }),
                );
                if let Err(error) = sent {
                    warn!(
                        target: CLIENT_TARGET,
                        error = %error,
                        "initialize-cljs negotiation failed"
                    );
                }
            })),
        )
    }

    /// Injects an input-echo frame into the output queue, so submitted
    /// code appears in the transcript ahead of its results.
    pub fn echo_input(&self, code: &str) {
        let mut map = Map::new();
        map.insert(Value::keyword("in"), Value::string(code));
        if let Some(sender) = lock(&self.shared.dispatch).as_ref() {
            let _ = sender.send(Response::from(map));
        }
    }

    /// Halts the client. Idempotent and safe to call from any thread,
    /// including from inside a continuation.
    ///
    /// Writes the quit form, shuts down both sockets so the reader loops
    /// observe end-of-stream and terminate, drops every pending
    /// continuation (they simply never fire — cancellation, not an
    /// error), and closes the queues so blocked consumers return
    /// promptly.
    pub fn halt(&self) {
        if self.shared.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_state_forced(ClientState::Closing);
        debug!(target: CLIENT_TARGET, "halting");

        if let Some(stream) = lock(&self.shared.primary).as_mut() {
            // Best effort: the remote may already be gone.
            let _ = transport::write_text(stream, StreamKind::Primary, ":repl/quit\n");
        }
        if let Some(stream) = lock(&self.shared.primary).take() {
            transport::shutdown(&stream);
        }
        if let Some(stream) = lock(&self.shared.backchannel).take() {
            transport::shutdown(&stream);
        }

        drop(lock(&self.shared.dispatch).take());
        let cancelled = self.shared.pending.drain();
        if cancelled > 0 {
            debug!(target: CLIENT_TARGET, cancelled, "dropped pending continuations");
        }
        lock(&self.shared.eval_slots).clear();
        drop(lock(&self.shared.output).take());

        self.set_state_forced(ClientState::Closed);
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.shared.halted.load(Ordering::SeqCst) {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }

    fn write_primary(&self, text: &str) -> Result<(), ClientError> {
        match lock(&self.shared.primary).as_mut() {
            Some(stream) => transport::write_text(stream, StreamKind::Primary, text),
            None => Err(ClientError::Closed),
        }
    }

    fn write_backchannel(&self, text: &str) -> Result<(), ClientError> {
        match lock(&self.shared.backchannel).as_mut() {
            Some(stream) => transport::write_text(stream, StreamKind::Backchannel, text),
            None => Err(ClientError::Closed),
        }
    }

    /// Advances the lifecycle unless a halt has already won.
    fn set_state(&self, next: ClientState) {
        let mut state = lock(&self.shared.state);
        if matches!(*state, ClientState::Closing | ClientState::Closed) {
            return;
        }
        *state = next;
    }

    fn set_state_forced(&self, next: ClientState) {
        *lock(&self.shared.state) = next;
    }
}

/// Reads primary-stream frames until end of stream, associating
/// `:ret`-tagged frames with queued evaluation continuations and routing
/// everything else to the output queue.
fn primary_loop(shared: &Arc<Shared>, mut stream: ValueStream, router: &OutputRouter) {
    loop {
        match stream.next_value() {
            Ok(Some(Value::Map(map))) => route_primary(shared, Response::from(map), router),
            Ok(Some(other)) => {
                debug!(target: CLIENT_TARGET, value = %other, "skipping raw primary output");
            }
            Ok(None) => break,
            Err(error) => {
                if !shared.halted.load(Ordering::SeqCst) {
                    warn!(target: CLIENT_TARGET, error = %error, "primary reader failed");
                }
                break;
            }
        }
    }
    debug!(target: CLIENT_TARGET, "primary reader loop exited");
    Client {
        shared: Arc::clone(shared),
    }
    .halt();
}

fn route_primary(shared: &Arc<Shared>, response: Response, router: &OutputRouter) {
    if response.tag_name() == Some("ret") {
        let slot = lock(&shared.eval_slots).pop_front();
        match slot {
            Some(EvalSlot::Continue(handler)) => {
                if catch_unwind(AssertUnwindSafe(move || handler(response))).is_err() {
                    warn!(
                        target: CLIENT_TARGET,
                        "evaluation continuation panicked; dispatch continues"
                    );
                }
            }
            Some(EvalSlot::Route) | None => router.route(response),
        }
    } else {
        router.route(response);
    }
}

/// Reads backchannel responses until end of stream, dispatching correlated
/// ones to their pending continuations and pushing uncorrelated ones onto
/// the inbound dispatch queue.
fn backchannel_loop(shared: &Arc<Shared>, mut stream: ValueStream, dispatch: &Sender<Response>) {
    loop {
        match stream.next_value() {
            Ok(Some(Value::Map(map))) => {
                if let Some(unclaimed) = shared.pending.dispatch(Response::from(map)) {
                    if unclaimed.id().is_some() {
                        // A response to a request sent without a
                        // continuation; dropped by contract.
                        debug!(
                            target: CLIENT_TARGET,
                            id = ?unclaimed.id(),
                            "dropping response with no registered continuation"
                        );
                    } else {
                        let _ = dispatch.send(unclaimed);
                    }
                }
            }
            Ok(Some(other)) => {
                debug!(target: CLIENT_TARGET, value = %other, "skipping non-map backchannel value");
            }
            Ok(None) => break,
            Err(error) => {
                if !shared.halted.load(Ordering::SeqCst) {
                    warn!(target: CLIENT_TARGET, error = %error, "backchannel reader failed");
                }
                break;
            }
        }
    }
    debug!(target: CLIENT_TARGET, "backchannel reader loop exited");
    Client {
        shared: Arc::clone(shared),
    }
    .halt();
}
