//! In-process mock REPL servers for exercising the client end to end.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use tether_edn::{Map, Value, read_partial, write};

use crate::client::{Client, ClientOptions, Timeouts};
use crate::output::OutputFrame;

const MOCK_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A single-connection TCP server the tests drive by hand, standing in
/// for either the remote REPL or its backchannel listener.
pub(crate) struct MockServer {
    listener: TcpListener,
    connection: Option<TcpStream>,
    buffer: Vec<u8>,
}

impl MockServer {
    pub(crate) fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        Self {
            listener,
            connection: None,
            buffer: Vec::new(),
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.listener.local_addr().expect("local address").port()
    }

    /// Blocks until the client connects.
    pub(crate) fn accept(&mut self) {
        let (stream, _) = self.listener.accept().expect("accept connection");
        stream
            .set_read_timeout(Some(MOCK_READ_TIMEOUT))
            .expect("set read timeout");
        self.connection = Some(stream);
    }

    fn connection(&mut self) -> &mut TcpStream {
        self.connection.as_mut().expect("no accepted connection")
    }

    pub(crate) fn send_text(&mut self, text: &str) {
        let connection = self.connection();
        connection.write_all(text.as_bytes()).expect("write to client");
        connection.flush().expect("flush to client");
    }

    /// Serialises a value and sends it as one newline-terminated frame.
    pub(crate) fn send_value(&mut self, value: &Value) {
        let mut text = write(value);
        text.push('\n');
        self.send_text(&text);
    }

    /// Reads one newline-terminated line, without the terminator.
    pub(crate) fn recv_line(&mut self) -> String {
        loop {
            if let Some(position) = self.buffer.iter().position(|&byte| byte == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=position).collect();
                let line = String::from_utf8(line).expect("client sent invalid UTF-8");
                return line.trim_end_matches(['\r', '\n']).to_owned();
            }
            self.fill();
        }
    }

    /// Reads one EDN value off the connection.
    pub(crate) fn recv_value(&mut self) -> Value {
        loop {
            let text = std::str::from_utf8(&self.buffer).expect("client sent invalid UTF-8");
            if let Ok(Some((value, consumed))) = read_partial(text) {
                self.buffer.drain(..consumed);
                return value;
            }
            self.fill();
        }
    }

    /// Asserts that no bytes arrive within the window.
    pub(crate) fn assert_silent(&mut self, window: Duration) {
        let connection = self.connection();
        connection
            .set_read_timeout(Some(window))
            .expect("set read timeout");
        let mut probe = [0u8; 64];
        match connection.read(&mut probe) {
            Ok(0) => {}
            Ok(count) => panic!(
                "expected silence, got {count} bytes: {:?}",
                String::from_utf8_lossy(&probe[..count])
            ),
            Err(error)
                if matches!(
                    error.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(error) => panic!("unexpected read failure: {error}"),
        }
        self.connection()
            .set_read_timeout(Some(MOCK_READ_TIMEOUT))
            .expect("restore read timeout");
    }

    fn fill(&mut self) {
        let mut chunk = [0u8; 1024];
        let count = self.connection().read(&mut chunk).expect("read from client");
        assert!(count > 0, "client closed the connection");
        self.buffer.extend_from_slice(&chunk[..count]);
    }
}

/// Builds a map of unqualified-keyword entries in the given order.
pub(crate) fn kwmap(entries: &[(&str, Value)]) -> Map {
    entries
        .iter()
        .map(|(name, value)| (Value::keyword(name), value.clone()))
        .collect()
}

/// The `:ret` frame announcing the backchannel address.
pub(crate) fn address_frame(port: u16) -> Value {
    Value::Map(kwmap(&[
        ("tag", Value::keyword("ret")),
        (
            "val",
            Value::string(format!("{{:host \"127.0.0.1\", :port {port}}}")),
        ),
    ]))
}

/// A connected client together with the mock servers driving it.
pub(crate) struct Harness {
    pub(crate) server: MockServer,
    pub(crate) backchannel: MockServer,
    pub(crate) client: Client,
    pub(crate) output: Receiver<OutputFrame>,
}

/// Walks a client through the full handshake against mock servers.
pub(crate) fn connect_harness(timeouts: Timeouts) -> Harness {
    let mut server = MockServer::start();
    let port = server.port();
    let connecting = thread::spawn(move || {
        Client::connect(ClientOptions {
            host: "127.0.0.1".to_owned(),
            port,
            timeouts,
        })
    });

    server.accept();
    server.send_text("user=> ");
    let _boot_loader = server.recv_line();

    let mut backchannel = MockServer::start();
    server.send_value(&address_frame(backchannel.port()));
    backchannel.accept();
    for _ in 0..6 {
        let _upload = backchannel.recv_value();
    }
    let _version_probe = server.recv_line();

    let client = connecting
        .join()
        .expect("join connect thread")
        .expect("connect failed");
    let output = client.take_output().expect("output receiver already taken");

    Harness {
        server,
        backchannel,
        client,
        output,
    }
}

/// Acknowledges one `set-eval-context` request read from the backchannel,
/// returning the request for further assertions.
pub(crate) fn ack_eval_context(backchannel: &mut MockServer) -> Map {
    let request = backchannel
        .recv_value()
        .as_map()
        .expect("expected a request map")
        .clone();
    let id = request
        .get_keyword("id")
        .and_then(Value::as_int)
        .expect("request without id");
    let ack = Value::Map(kwmap(&[
        ("id", Value::Int(id)),
        ("file", Value::Nil),
        ("ns", request.get_keyword("ns").cloned().unwrap_or(Value::Nil)),
        ("dialect", Value::keyword("clj")),
    ]));
    backchannel.send_value(&ack);
    request
}
