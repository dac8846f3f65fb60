//! End-to-end behaviour of the client against mock REPL servers.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use rstest::rstest;

use tether_edn::Value;

use crate::client::{Client, ClientOptions, ClientState, Timeouts};
use crate::errors::ClientError;
use crate::registry::Registry;
use crate::session::Dialect;
use crate::tests::support::{
    Harness, MockServer, ack_eval_context, address_frame, connect_harness, kwmap,
};

const FRAME_WAIT: Duration = Duration::from_secs(2);

fn short_timeouts() -> Timeouts {
    Timeouts {
        connect: Duration::from_secs(2),
        handshake: Duration::from_secs(2),
        eval_context: Duration::from_millis(250),
    }
}

#[rstest]
fn connection_refusal_surfaces_immediately() {
    // Bind-then-drop yields a port with nothing listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local address").port()
    };

    let error = Client::connect(ClientOptions::new("127.0.0.1", port))
        .expect_err("expected a connection error");
    assert!(matches!(error, ClientError::Connect { .. }));
}

#[rstest]
fn handshake_timeout_when_no_address_appears() {
    let mut server = MockServer::start();
    let port = server.port();
    let timeouts = Timeouts {
        handshake: Duration::from_millis(300),
        ..Timeouts::default()
    };
    let connecting = thread::spawn(move || {
        Client::connect(ClientOptions {
            host: "127.0.0.1".to_owned(),
            port,
            timeouts,
        })
    });

    server.accept();
    // Greet like a bare REPL but never announce a backchannel.
    server.send_text("user=> ");
    let _boot_loader = server.recv_line();

    let error = connecting
        .join()
        .expect("join connect thread")
        .expect_err("expected a handshake timeout");
    assert!(matches!(error, ClientError::HandshakeTimeout { .. }));
}

/// The full bootstrap-evaluate-quit conversation, mirrored frame by frame
/// against a scripted remote.
#[rstest]
fn smoke() {
    let mut server = MockServer::start();
    let port = server.port();
    let connecting =
        thread::spawn(move || Client::connect(ClientOptions::new("127.0.0.1", port)));

    server.accept();
    server.send_text("user=> ");

    // The client starts the sub-REPL with a plain-text loader.
    let boot_loader = server.recv_line();
    assert!(boot_loader.starts_with("(clojure.core/load-string"));

    let mut backchannel = MockServer::start();
    server.send_value(&address_frame(backchannel.port()));
    backchannel.accept();

    // The runtime bundle uploads in fixed order.
    for expected in [
        "lookup.clj",
        "completions.clj",
        "load_blob.clj",
        "test.clj",
        "cljs.clj",
        "shadow.clj",
    ] {
        let request = backchannel.recv_value();
        let request = request.as_map().expect("expected a request map");
        assert_eq!(request.get_keyword("op"), Some(&Value::keyword("load-base64")));
        assert_eq!(
            request.get_keyword("filename"),
            Some(&Value::string(expected))
        );
        assert!(
            request
                .get_keyword("content")
                .and_then(Value::as_str)
                .is_some_and(|content| !content.is_empty()),
            "missing content for {expected}"
        );
    }

    let version_probe = server.recv_line();
    assert_eq!(version_probe, "(println \"Clojure\" (clojure-version))");

    let client = connecting
        .join()
        .expect("join connect thread")
        .expect("connect failed");
    assert_eq!(client.state(), ClientState::Ready);
    let output = client.take_output().expect("output receiver");

    // The version text surfaces as an out frame, then its ret frame.
    server.send_value(&Value::Map(kwmap(&[
        ("tag", Value::keyword("out")),
        ("val", Value::string("Clojure 1.11.0-alpha1")),
    ])));
    server.send_value(&Value::Map(kwmap(&[
        ("tag", Value::keyword("ret")),
        ("val", Value::string("nil")),
        ("ns", Value::string("user")),
        ("ms", Value::Int(0)),
        ("form", Value::string(version_probe.clone())),
    ])));

    let version = output.recv_timeout(FRAME_WAIT).expect("version frame");
    assert_eq!(version.printable, "Clojure 1.11.0-alpha1\n");
    assert_eq!(
        version.response.get("val"),
        Some(&Value::string("Clojure 1.11.0-alpha1"))
    );
    let version_ret = output.recv_timeout(FRAME_WAIT).expect("version ret frame");
    assert_eq!(version_ret.printable, "nil\n");

    // Evaluation: the context request precedes any code bytes.
    let evaluator = client.clone();
    let evaluating = thread::spawn(move || evaluator.eval("(inc 1)"));

    let context = ack_eval_context(&mut backchannel);
    assert_eq!(
        context.get_keyword("op"),
        Some(&Value::keyword("set-eval-context"))
    );
    assert_eq!(
        context.get_keyword("file"),
        Some(&Value::string("NO_SOURCE_FILE"))
    );
    assert_eq!(context.get_keyword("ns"), Some(&Value::symbol("user")));
    assert_eq!(context.get_keyword("line"), Some(&Value::Int(1)));
    assert_eq!(context.get_keyword("column"), Some(&Value::Int(1)));

    evaluating
        .join()
        .expect("join eval thread")
        .expect("eval failed");
    assert_eq!(server.recv_line(), "(inc 1)");

    let ret = Value::Map(kwmap(&[
        ("tag", Value::keyword("ret")),
        ("val", Value::string("2")),
        ("ns", Value::string("user")),
        ("ms", Value::Int(1)),
        ("form", Value::string("(inc 1)")),
    ]));
    server.send_value(&ret);

    let result = output.recv_timeout(FRAME_WAIT).expect("result frame");
    assert_eq!(result.printable, "2\n");
    assert_eq!(Value::Map(result.response.into_map()), ret);

    // Quit form on the way out.
    client.halt();
    assert_eq!(server.recv_line(), ":repl/quit");
    assert_eq!(client.state(), ClientState::Closed);
}

#[rstest]
fn eval_times_out_without_transmitting_code() {
    let Harness {
        mut server,
        mut backchannel,
        client,
        output: _output,
    } = connect_harness(short_timeouts());

    let error = client.eval("(inc 1)").expect_err("expected a timeout");
    assert!(matches!(error, ClientError::ContextTimeout { .. }));

    // The context request went out, but no code ever followed.
    let request = backchannel.recv_value();
    let request = request.as_map().expect("expected a request map");
    assert_eq!(
        request.get_keyword("op"),
        Some(&Value::keyword("set-eval-context"))
    );
    server.assert_silent(Duration::from_millis(300));

    client.halt();
}

#[rstest]
fn eval_continuations_receive_the_next_ret_frame() {
    let Harness {
        mut server,
        mut backchannel,
        client,
        output,
    } = connect_harness(Timeouts::default());

    let (result_tx, result_rx) = std::sync::mpsc::channel();
    let evaluator = client.clone();
    let evaluating = thread::spawn(move || {
        evaluator.eval_with(
            "(inc 1)",
            crate::client::EvalOptions::default(),
            Some(Box::new(move |response| {
                let _ = result_tx.send(response);
            })),
        )
    });

    ack_eval_context(&mut backchannel);
    evaluating
        .join()
        .expect("join eval thread")
        .expect("eval failed");
    assert_eq!(server.recv_line(), "(inc 1)");

    server.send_value(&Value::Map(kwmap(&[
        ("tag", Value::keyword("ret")),
        ("val", Value::string("2")),
    ])));

    let response = result_rx
        .recv_timeout(FRAME_WAIT)
        .expect("continuation result");
    assert_eq!(response.val(), Some("2"));

    // The frame went to the continuation, not the output queue.
    assert!(matches!(
        output.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Timeout)
    ));

    client.halt();
}

#[rstest]
fn namespace_compensation_restores_the_previous_namespace() {
    let Harness {
        server: _server,
        mut backchannel,
        client,
        output: _output,
    } = connect_harness(short_timeouts());

    let switcher = client.clone();
    let switching = thread::spawn(move || switcher.switch_namespace("app.core", Dialect::Clj));
    let request = ack_eval_context(&mut backchannel);
    assert_eq!(request.get_keyword("ns"), Some(&Value::Symbol(tether_edn::Symbol::qualified("app", "core"))));
    switching
        .join()
        .expect("join switch thread")
        .expect("switch failed");
    assert_eq!(client.namespace(), "app.core");

    // A scoped switch whose ack never arrives: the optimistic update
    // stands, per contract.
    let error = client
        .switch_namespace("scratch", Dialect::Clj)
        .expect_err("expected a timeout");
    assert!(matches!(error, ClientError::ContextTimeout { .. }));
    let _unacked = backchannel.recv_value();
    assert_eq!(client.namespace(), "scratch");

    // The caller compensates, restoring the namespace it started from.
    let restorer = client.clone();
    let restoring = thread::spawn(move || restorer.switch_namespace("app.core", Dialect::Clj));
    ack_eval_context(&mut backchannel);
    restoring
        .join()
        .expect("join restore thread")
        .expect("restore failed");
    assert_eq!(client.namespace(), "app.core");

    client.halt();
}

#[rstest]
fn concurrent_sends_receive_distinct_ids() {
    let Harness {
        server: _server,
        backchannel: _backchannel,
        client,
        output: _output,
    } = connect_harness(Timeouts::default());

    let mut workers = Vec::new();
    for _ in 0..4 {
        let sender = client.clone();
        workers.push(thread::spawn(move || {
            (0..25)
                .map(|_| sender.send(crate::ops::interrupt()).expect("send failed"))
                .collect::<Vec<i64>>()
        }));
    }

    let mut seen = HashSet::new();
    for worker in workers {
        let ids = worker.join().expect("join sender thread");
        // Issue order within a thread is monotonic.
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        for id in ids {
            assert!(seen.insert(id), "id {id} issued twice");
        }
    }

    client.halt();
}

#[rstest]
fn rollup_responses_stream_until_the_summary() {
    let Harness {
        server: _server,
        mut backchannel,
        client,
        output: _output,
    } = connect_harness(Timeouts::default());

    let (event_tx, event_rx) = std::sync::mpsc::channel();
    let id = client
        .run_tests("app.core-test", &[], move |event| {
            let _ = event_tx.send(event);
        })
        .expect("run-tests failed");

    let request = backchannel.recv_value();
    let request = request.as_map().expect("expected a request map");
    assert_eq!(request.get_keyword("op"), Some(&Value::keyword("test")));

    for tag in ["pass", "fail", "ret"] {
        backchannel.send_value(&Value::Map(kwmap(&[
            ("id", Value::Int(id)),
            ("tag", Value::keyword(tag)),
        ])));
    }

    let tags: Vec<Option<String>> = (0..3)
        .map(|_| {
            event_rx
                .recv_timeout(FRAME_WAIT)
                .expect("test event")
                .tag_name()
                .map(str::to_owned)
        })
        .collect();
    assert_eq!(
        tags,
        vec![
            Some("pass".to_owned()),
            Some("fail".to_owned()),
            Some("ret".to_owned())
        ]
    );

    // The summary completed the rollup; a late event no longer matches.
    backchannel.send_value(&Value::Map(kwmap(&[
        ("id", Value::Int(id)),
        ("tag", Value::keyword("pass")),
    ])));
    assert!(matches!(
        event_rx.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Timeout)
    ));

    client.halt();
}

#[rstest]
fn lookup_responses_reach_their_continuation() {
    let Harness {
        server: _server,
        mut backchannel,
        client,
        output: _output,
    } = connect_harness(Timeouts::default());

    let (info_tx, info_rx) = std::sync::mpsc::channel();
    let id = client
        .lookup("mapcat", Some("user"), move |response| {
            let _ = info_tx.send(response);
        })
        .expect("lookup failed");

    let request = backchannel.recv_value();
    let request = request.as_map().expect("expected a request map");
    assert_eq!(request.get_keyword("op"), Some(&Value::keyword("lookup")));
    assert_eq!(request.get_keyword("named"), Some(&Value::string("mapcat")));
    assert_eq!(request.get_keyword("dialect"), Some(&Value::keyword("clj")));

    backchannel.send_value(&Value::Map(kwmap(&[
        ("id", Value::Int(id)),
        (
            "info",
            Value::Map(kwmap(&[
                ("name", Value::symbol("mapcat")),
                ("ns", Value::symbol("clojure.core")),
                ("file", Value::string("jar:file:/deps/clojure.jar!/clojure/core.clj")),
                ("line", Value::Int(2793)),
                ("column", Value::Int(1)),
            ])),
        ),
    ])));

    let response = info_rx.recv_timeout(FRAME_WAIT).expect("lookup response");
    let info = response
        .get("info")
        .and_then(Value::as_map)
        .expect("expected an info map");
    let location = crate::location::parse_location(info).expect("expected a location");
    assert_eq!(location.scheme, "jar");
    assert_eq!(location.line, 2792);

    client.halt();
}

#[rstest]
fn halt_is_idempotent_and_releases_blocked_consumers() {
    let Harness {
        server: _server,
        backchannel: _backchannel,
        client,
        output,
    } = connect_harness(Timeouts::default());

    let consumer = thread::spawn(move || {
        let started = Instant::now();
        // Blocks until the queue closes.
        while output.recv().is_ok() {}
        started.elapsed()
    });

    // Give the consumer time to park on the queue.
    thread::sleep(Duration::from_millis(100));
    client.halt();
    client.halt();

    let blocked_for = consumer.join().expect("join consumer thread");
    assert!(
        blocked_for < Duration::from_secs(2),
        "consumer stayed blocked after halt: {blocked_for:?}"
    );

    assert!(matches!(client.eval("1"), Err(ClientError::Closed)));
    assert!(matches!(
        client.send(crate::ops::interrupt()),
        Err(ClientError::Closed)
    ));
    assert_eq!(client.state(), ClientState::Closed);
}

#[rstest]
fn echoed_input_surfaces_with_a_prefix() {
    let Harness {
        server: _server,
        backchannel: _backchannel,
        client,
        output,
    } = connect_harness(Timeouts::default());

    client.echo_input("(inc 1)");
    let frame = output.recv_timeout(FRAME_WAIT).expect("echo frame");
    assert_eq!(frame.printable, "=> (inc 1)\n");

    client.halt();
}

#[rstest]
fn registry_maps_owners_to_clients() {
    let Harness {
        server: _server,
        backchannel: _backchannel,
        client,
        output: _output,
    } = connect_harness(Timeouts::default());

    let registry = Registry::new();
    let client = Arc::new(client);
    registry.register(7, Arc::clone(&client));
    assert!(registry.get(7).is_some());
    assert!(registry.get(8).is_none());

    assert!(registry.forget(7));
    assert!(!registry.forget(7));
    assert!(registry.is_empty());
    assert_eq!(client.state(), ClientState::Closed);
}
