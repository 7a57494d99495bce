//! Client behaviour against a scripted peer on a socket pair.

use std::os::unix::net::UnixStream;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use peaky_protocol::payloads::{SessionNamesResponse, StartSessionRequest};
use peaky_protocol::transport::{self, EnvelopeReader, EnvelopeWriter};
use peaky_protocol::{
    Context, Envelope, EnvelopeKind, Event, EventType, Op, encode_payload,
};
use rstest::{fixture, rstest};

use super::Client;
use crate::errors::ClientError;

/// Daemon half of a socket pair, driven step by step by the test.
struct ScriptedDaemon {
    reader: EnvelopeReader,
    writer: EnvelopeWriter,
}

impl ScriptedDaemon {
    fn expect_request(&mut self) -> Envelope {
        let envelope = self.reader.read().expect("read request");
        assert_eq!(envelope.kind, EnvelopeKind::Request);
        envelope
    }

    fn send(&mut self, envelope: &Envelope) {
        self.writer
            .write(envelope, &Context::background())
            .expect("write envelope");
    }

    fn respond(&mut self, request: &Envelope, payload: Vec<u8>) {
        self.send(&Envelope::response_to(request).with_payload(payload));
    }

    fn publish(&mut self, event: &Event) {
        let payload = encode_payload(event).expect("encode event");
        self.send(&Envelope::event(event.event_type, payload));
    }
}

#[fixture]
fn pair() -> (Client, ScriptedDaemon) {
    let (near, far) = UnixStream::pair().expect("socket pair");
    let client = Client::from_stream(near).expect("client");
    let (reader, writer) = transport::split(far).expect("split");
    (client, ScriptedDaemon { reader, writer })
}

fn names(list: &[&str]) -> Vec<u8> {
    encode_payload(&SessionNamesResponse {
        names: list.iter().map(|name| (*name).to_owned()).collect(),
    })
    .expect("encode names")
}

#[rstest]
fn calls_receive_the_response_with_their_id(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let peer = thread::spawn(move || {
        let request = daemon.expect_request();
        assert_eq!(request.operation(), Some(Op::SessionNames));
        daemon.respond(&request, names(&["alpha"]));
        daemon
    });
    let response: SessionNamesResponse = client
        .call_typed(&Context::background(), Op::SessionNames, &())
        .expect("call");
    assert_eq!(response.names, vec!["alpha"]);
    assert_eq!(client.pending_calls(), 0);
    drop(peer.join().expect("join peer"));
}

#[rstest]
fn duplicate_responses_are_ignored(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let peer = thread::spawn(move || {
        let first = daemon.expect_request();
        daemon.respond(&first, names(&["one"]));
        daemon.respond(&first, names(&["duplicate"]));
        let second = daemon.expect_request();
        daemon.respond(&second, names(&["two"]));
        daemon
    });
    let context = Context::background();
    let first: SessionNamesResponse = client
        .call_typed(&context, Op::SessionNames, &())
        .expect("first call");
    let second: SessionNamesResponse = client
        .call_typed(&context, Op::SessionNames, &())
        .expect("second call");
    assert_eq!(first.names, vec!["one"]);
    assert_eq!(second.names, vec!["two"]);
    drop(peer.join().expect("join peer"));
}

#[rstest]
fn remote_errors_carry_the_daemon_text(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let peer = thread::spawn(move || {
        let request = daemon.expect_request();
        daemon.send(&Envelope::response_to(&request).with_error("session \"x\" exists"));
        daemon
    });
    let request = StartSessionRequest {
        name: "x".to_owned(),
        ..StartSessionRequest::default()
    };
    let error = client
        .call(
            &Context::background(),
            Op::StartSession,
            encode_payload(&request).expect("encode"),
        )
        .expect_err("remote failure");
    match error {
        ClientError::Remote { op, message } => {
            assert_eq!(op, Op::StartSession);
            assert_eq!(message, "session \"x\" exists");
        }
        other => panic!("unexpected error: {other}"),
    }
    drop(peer.join().expect("join peer"));
}

#[rstest]
fn cancelled_calls_release_their_slot(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let context = Context::background().child();
    let cancel = context.cancel_handle();
    let peer = thread::spawn(move || {
        let request = daemon.expect_request();
        cancel.cancel();
        (daemon, request)
    });
    let error = client
        .call(&context, Op::Snapshot, Vec::new())
        .expect_err("cancelled");
    assert!(matches!(error, ClientError::Cancelled));
    assert_eq!(client.pending_calls(), 0);

    let (mut daemon, request) = peer.join().expect("join peer");
    daemon.respond(&request, Vec::new());
    assert!(!client.is_closed());
}

#[rstest]
fn deadlines_end_unanswered_calls(pair: (Client, ScriptedDaemon)) {
    let (client, _daemon) = pair;
    let context = Context::background().with_timeout(Duration::from_millis(50));
    let error = client
        .call(&context, Op::Snapshot, Vec::new())
        .expect_err("deadline");
    assert!(matches!(error, ClientError::DeadlineExceeded));
    assert_eq!(client.pending_calls(), 0);
}

#[rstest]
fn daemon_disconnects_fail_waiting_calls(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let peer = thread::spawn(move || {
        daemon.expect_request();
        drop(daemon);
    });
    let error = client
        .call(&Context::background(), Op::Snapshot, Vec::new())
        .expect_err("connection lost");
    assert!(error.is_unavailable(), "unexpected error: {error}");
    peer.join().expect("join peer");
    assert!(client.is_closed());
    assert!(matches!(
        client.call(&Context::background(), Op::Snapshot, Vec::new()),
        Err(ClientError::Unavailable)
    ));
}

#[rstest]
fn events_are_delivered_in_order(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let stream = client.events().expect("event stream");
    assert!(client.events().is_none());
    daemon.publish(&Event::new(EventType::SessionChanged, 1).with_session("alpha"));
    daemon.publish(&Event::new(EventType::Toast, 2).with_detail("built"));

    let first = stream.recv_timeout(Duration::from_secs(2)).expect("first event");
    let second = stream.recv_timeout(Duration::from_secs(2)).expect("second event");
    assert_eq!(first.event_type, EventType::SessionChanged);
    assert_eq!(second.detail, "built");

    client.close();
    assert!(stream.recv_timeout(Duration::from_secs(2)).is_err());
}

#[rstest]
fn events_stop_at_close(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    let stream = client.events().expect("event stream");
    daemon.publish(&Event::new(EventType::Toast, 1).with_detail("before close"));
    thread::sleep(Duration::from_millis(100));
    client.close();
    assert_eq!(
        stream.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Disconnected)
    );
}

#[rstest]
fn close_is_idempotent(pair: (Client, ScriptedDaemon)) {
    let (client, mut daemon) = pair;
    client.close();
    client.close();
    assert!(client.is_closed());
    assert!(daemon.reader.read().is_err());
}
