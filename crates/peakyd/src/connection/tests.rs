//! Connection record, registry and serving loop tests.

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use peaky_protocol::payloads::{
    HelloRequest, HelloResponse, PaneViewRequest, PaneViewResponse, StartSessionRequest,
};
use peaky_protocol::transport::{self, EnvelopeReader, EnvelopeWriter};
use peaky_protocol::{
    Context, Envelope, EnvelopeKind, Event, EventType, Op, PushOutcome, decode_payload,
    encode_payload,
};
use rstest::{fixture, rstest};

use super::manager::worker_loop;
use super::*;
use crate::dispatch::Router;
use crate::manager::{MemoryManager, SessionManager};
use crate::state::DaemonState;
use crate::transport::ConnectionHandler;

fn focus(pane: &str, detail: &str) -> Event {
    Event::new(EventType::FocusChanged, 1)
        .with_pane(pane)
        .with_detail(detail)
}

fn response(id: u64) -> Envelope {
    Envelope::response_to(&Envelope::request(id, Op::Hello, Vec::new()))
}

#[fixture]
fn connection() -> Connection {
    Connection::new(1, None)
}

#[rstest]
fn responses_are_written_before_events(connection: Connection) {
    connection.push_event(focus("p1", "first"));
    connection.send_response(response(7)).expect("queue response");

    assert_eq!(connection.next_outgoing(), Some(Outgoing::Response(response(7))));
    assert!(matches!(connection.next_outgoing(), Some(Outgoing::Event(_))));
}

#[rstest]
fn events_for_one_key_coalesce_to_the_latest(connection: Connection) {
    assert_eq!(connection.push_event(focus("p1", "first")), PushOutcome::Queued);
    assert_eq!(connection.push_event(focus("p2", "other")), PushOutcome::Queued);
    assert_eq!(connection.push_event(focus("p1", "second")), PushOutcome::Replaced);

    let Some(Outgoing::Event(first)) = connection.next_outgoing() else {
        panic!("expected an event");
    };
    assert_eq!(first.pane_id, "p1");
    assert_eq!(first.detail, "second");
    let Some(Outgoing::Event(second)) = connection.next_outgoing() else {
        panic!("expected an event");
    };
    assert_eq!(second.pane_id, "p2");
}

#[rstest]
fn closing_is_idempotent_and_stops_traffic(connection: Connection) {
    connection.push_event(focus("p1", "pending"));
    assert!(connection.close());
    assert!(!connection.close());

    assert!(connection.is_closed());
    assert!(connection.context().is_done());
    assert!(connection.scheduler().is_closed());
    assert_eq!(connection.next_outgoing(), None);
    assert_eq!(connection.send_response(response(1)), Err(ConnectionError::Closed));
    assert_eq!(connection.push_event(focus("p1", "late")), PushOutcome::Dropped);
}

#[rstest]
fn full_response_queue_waits_for_the_writer() {
    let connection = Arc::new(Connection::new(1, None));
    for id in 0..RESPONSE_QUEUE_CAPACITY {
        connection
            .send_response(response(id as u64))
            .expect("queue response");
    }
    let sender = {
        let connection = Arc::clone(&connection);
        thread::spawn(move || connection.send_response(response(999)))
    };
    thread::sleep(Duration::from_millis(20));
    assert!(!sender.is_finished(), "sender should wait for room");

    assert_eq!(connection.next_outgoing(), Some(Outgoing::Response(response(0))));
    assert_eq!(sender.join().expect("sender thread"), Ok(()));
}

#[rstest]
fn blocked_writer_wakes_on_close() {
    let connection = Arc::new(Connection::new(1, None));
    let writer = {
        let connection = Arc::clone(&connection);
        thread::spawn(move || connection.next_outgoing())
    };
    thread::sleep(Duration::from_millis(20));
    connection.close();
    assert_eq!(writer.join().expect("writer thread"), None);
}

#[rstest]
fn registry_numbers_and_broadcasts() {
    let registry = ConnectionRegistry::new();
    let first = Arc::new(Connection::new(registry.next_id(), None));
    let second = Arc::new(Connection::new(registry.next_id(), None));
    assert_eq!((first.id(), second.id()), (1, 2));
    assert!(registry.register(Arc::clone(&first)));
    assert!(registry.register(Arc::clone(&second)));

    registry.broadcast(&focus("p1", "both"));
    for connection in [&first, &second] {
        assert!(matches!(connection.next_outgoing(), Some(Outgoing::Event(_))));
    }

    registry.deregister(first.id());
    assert_eq!(registry.len(), 1);
}

#[rstest]
fn close_all_closes_and_refuses_new_connections() {
    let registry = ConnectionRegistry::new();
    let open = Arc::new(Connection::new(registry.next_id(), None));
    registry.register(Arc::clone(&open));

    assert_eq!(registry.close_all(), 1);
    assert!(open.is_closed());
    assert!(registry.is_empty());

    let late = Arc::new(Connection::new(registry.next_id(), None));
    assert!(!registry.register(Arc::clone(&late)));
    assert!(late.is_closed());
}

fn state_with_pane() -> (Arc<DaemonState>, String) {
    let manager = Arc::new(MemoryManager::new());
    manager
        .start_session(&StartSessionRequest {
            name: "alpha".to_owned(),
            ..StartSessionRequest::default()
        })
        .expect("start session");
    let pane = manager
        .snapshot(0)
        .into_iter()
        .flat_map(|session| session.panes)
        .map(|pane| pane.id)
        .next()
        .expect("pane");
    (Arc::new(DaemonState::new(manager, "1.2.3")), pane)
}

fn view_request(id: u64, pane: &str, cols: u16) -> Envelope {
    let request = PaneViewRequest {
        pane_id: pane.to_owned(),
        cols,
        rows: 4,
        ..PaneViewRequest::default()
    };
    Envelope::request(id, Op::PaneView, encode_payload(&request).expect("encode"))
}

#[rstest]
fn worker_renders_only_the_latest_request_per_pane() {
    let (state, pane) = state_with_pane();
    let connection = Arc::new(Connection::new(1, None));
    for (id, cols) in [(1, 10), (2, 20)] {
        let envelope = view_request(id, &pane, cols);
        let request = decode_payload(&envelope.payload).expect("decode");
        connection.scheduler().enqueue(envelope, request);
    }

    let worker = {
        let connection = Arc::clone(&connection);
        thread::spawn(move || worker_loop(&state, &connection))
    };
    let Some(Outgoing::Response(envelope)) = connection.next_outgoing() else {
        panic!("expected a response");
    };
    assert_eq!(envelope.id, 2);
    let view: PaneViewResponse = decode_payload(&envelope.payload).expect("decode view");
    assert_eq!(view.cols, 20);

    connection.close();
    worker.join().expect("worker thread");
}

struct Session {
    reader: EnvelopeReader,
    writer: EnvelopeWriter,
    state: Arc<DaemonState>,
    pane: String,
    server: thread::JoinHandle<()>,
}

impl Session {
    fn send(&mut self, envelope: &Envelope) {
        self.writer
            .write(envelope, &Context::background())
            .expect("write request");
    }

    fn receive(&mut self) -> Envelope {
        self.reader.read().expect("read envelope")
    }

    fn finish(self) {
        drop(self.writer);
        drop(self.reader);
        self.server.join().expect("server thread");
    }
}

#[fixture]
fn session() -> Session {
    let (state, pane) = state_with_pane();
    let (client, server) = UnixStream::pair().expect("socket pair");
    let manager = ConnectionManager::new(Arc::clone(&state), Arc::new(Router::new()));
    let server = thread::spawn(move || manager.handle(server));
    let (reader, writer) = transport::split(client).expect("split client");
    Session {
        reader,
        writer,
        state,
        pane,
        server,
    }
}

#[rstest]
fn requests_are_answered_with_their_id(mut session: Session) {
    let hello = HelloRequest {
        version: "1".to_owned(),
        client_id: "test".to_owned(),
    };
    session.send(&Envelope::request(
        7,
        Op::Hello,
        encode_payload(&hello).expect("encode"),
    ));
    let reply = session.receive();
    assert_eq!(reply.kind, EnvelopeKind::Response);
    assert_eq!(reply.id, 7);
    let hello: HelloResponse = decode_payload(&reply.payload).expect("decode");
    assert_eq!(hello.version, "1.2.3");

    let mut unknown = Envelope::request(8, Op::Hello, Vec::new());
    unknown.op = "teleport".to_owned();
    session.send(&unknown);
    let reply = session.receive();
    assert_eq!(reply.id, 8);
    assert!(reply.error.contains("teleport"));
    session.finish();
}

#[rstest]
fn pane_views_are_rendered_by_workers(mut session: Session) {
    let pane = session.pane.clone();
    session.send(&view_request(3, &pane, 12));
    let reply = session.receive();
    assert_eq!(reply.id, 3);
    assert!(!reply.is_error(), "{}", reply.error);
    let view: PaneViewResponse = decode_payload(&reply.payload).expect("decode");
    assert_eq!(view.pane_id, pane);
    assert_eq!(view.cols, 12);
    session.finish();
}

#[rstest]
fn published_events_reach_the_client(mut session: Session) {
    session.send(&Envelope::request(1, Op::Hello, Vec::new()));
    let _ = session.receive();
    assert_eq!(session.state.connections().len(), 1);

    session.state.publish(focus("p-9", "hello"));
    let event = session.receive();
    assert_eq!(event.kind, EnvelopeKind::Event);
    assert_eq!(event.event, Some(EventType::FocusChanged));
    let decoded: Event = decode_payload(&event.payload).expect("decode event");
    assert_eq!(decoded.pane_id, "p-9");

    let state = Arc::clone(&session.state);
    session.finish();
    assert!(state.connections().is_empty());
}
