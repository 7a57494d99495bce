//! Client calls, events and lifecycle helpers against an in-process daemon.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use peaky_protocol::payloads::StartSessionRequest;
use peaky_protocol::{Context, Event, EventType, Op};
use peakyd::Daemon;
use peakyd::manager::{MemoryManager, SessionManager};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::{Client, ClientError, DaemonOptions, LifecycleError, ensure_daemon_running, stop_daemon};

const EVENT_WAIT: Duration = Duration::from_secs(2);

struct ClientWorld {
    _dir: TempDir,
    socket: Utf8PathBuf,
    manager: Arc<MemoryManager>,
    daemon: Option<Daemon>,
    client: Option<Client>,
    events: Option<Receiver<Event>>,
    pane: Option<String>,
    call_error: Option<ClientError>,
    lifecycle: Option<Result<bool, LifecycleError>>,
}

impl ClientWorld {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        Self {
            socket: root.join("daemon.sock"),
            _dir: dir,
            manager: Arc::new(MemoryManager::new()),
            daemon: None,
            client: None,
            events: None,
            pane: None,
            call_error: None,
            lifecycle: None,
        }
    }

    fn client(&self) -> &Client {
        self.client.as_ref().expect("client dialled")
    }

    fn options(&self) -> DaemonOptions {
        DaemonOptions::new(self.socket.clone())
            .with_startup_timeout(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(20))
    }
}

impl Drop for ClientWorld {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            client.close();
        }
        if let Some(daemon) = self.daemon.take() {
            let _ = daemon.stop();
        }
    }
}

#[fixture]
fn world() -> RefCell<ClientWorld> {
    RefCell::new(ClientWorld::new())
}

#[given("a running daemon")]
fn given_daemon(world: &RefCell<ClientWorld>) {
    let mut world = world.borrow_mut();
    let daemon = Daemon::start(&world.socket, world.manager.clone(), "0.0.0-test").expect("start daemon");
    world.daemon = Some(daemon);
}

#[given("no daemon is listening")]
fn given_no_daemon(world: &RefCell<ClientWorld>) {
    let world = world.borrow();
    assert!(!world.socket.exists());
}

fn dial(world: &RefCell<ClientWorld>) {
    let mut world = world.borrow_mut();
    let client = Client::dial(&world.socket, "behaviour", &Context::background()).expect("dial");
    world.events = client.events();
    world.client = Some(client);
}

#[given("a connected client")]
fn given_client(world: &RefCell<ClientWorld>) {
    dial(world);
}

#[when("the client dials the daemon")]
fn when_dial(world: &RefCell<ClientWorld>) {
    dial(world);
}

#[given("the client started a session named {name}")]
fn given_started_session(world: &RefCell<ClientWorld>, name: String) {
    let mut world = world.borrow_mut();
    let request = StartSessionRequest {
        name: name.clone(),
        ..StartSessionRequest::default()
    };
    world
        .client()
        .start_session(&Context::background(), &request)
        .expect("start session");
    let pane = world
        .manager
        .snapshot(0)
        .into_iter()
        .find(|session| session.name == name)
        .and_then(|session| session.panes.into_iter().next())
        .map(|pane| pane.id)
        .expect("first pane");
    world.pane = Some(pane);
}

#[when("the client starts sessions {first} and {second}")]
fn when_start_sessions(world: &RefCell<ClientWorld>, first: String, second: String) {
    let world = world.borrow();
    for name in [first, second] {
        let request = StartSessionRequest {
            name: name.clone(),
            ..StartSessionRequest::default()
        };
        let started = world
            .client()
            .start_session(&Context::background(), &request)
            .expect("start session");
        assert_eq!(started.name, name);
    }
}

#[when("the pane raises a notification reading {text}")]
fn when_notification(world: &RefCell<ClientWorld>, text: String) {
    let world = world.borrow();
    let pane = world.pane.as_deref().expect("session started");
    world.manager.notify(pane, &text);
}

#[when("the client resizes pane {pane}")]
fn when_resize(world: &RefCell<ClientWorld>, pane: String) {
    let mut world = world.borrow_mut();
    let result = world.client().resize_pane(&Context::background(), &pane, 80, 24);
    world.call_error = result.err();
}

#[when("the daemon is asked to stop")]
fn when_stop(world: &RefCell<ClientWorld>) {
    let mut world = world.borrow_mut();
    let outcome = stop_daemon(&world.options(), &Context::background());
    world.lifecycle = Some(outcome);
}

#[when("the daemon is ensured with binary {binary}")]
fn when_ensure(world: &RefCell<ClientWorld>, binary: String) {
    let mut world = world.borrow_mut();
    let options = world.options().with_binary(binary);
    let outcome = ensure_daemon_running(&options, &Context::background()).map(|client| {
        client.close();
        true
    });
    world.lifecycle = Some(outcome);
}

#[then("the client reports daemon version {version}")]
fn then_version(world: &RefCell<ClientWorld>, version: String) {
    let world = world.borrow();
    let hello = world.client().daemon();
    assert_eq!(hello.version, version);
    assert_eq!(hello.pid, std::process::id());
}

#[then("a second handshake agrees")]
fn then_second_hello(world: &RefCell<ClientWorld>) {
    let world = world.borrow();
    let hello = world
        .client()
        .hello(&Context::background(), "behaviour")
        .expect("hello");
    assert_eq!(&hello, world.client().daemon());
    assert_eq!(world.client().pending_calls(), 0);
}

#[then("the session names are {first} and {second}")]
fn then_session_names(world: &RefCell<ClientWorld>, first: String, second: String) {
    let world = world.borrow();
    let names = world
        .client()
        .session_names(&Context::background())
        .expect("session names");
    assert_eq!(names, vec![first, second]);
}

#[then("the event stream delivers a toast reading {text}")]
fn then_toast(world: &RefCell<ClientWorld>, text: String) {
    let world = world.borrow();
    let events = world.events.as_ref().expect("event stream taken");
    let deadline = Instant::now() + EVENT_WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events.recv_timeout(remaining).expect("toast before deadline");
        if event.event_type == EventType::Toast {
            assert_eq!(event.detail, text);
            assert_eq!(Some(event.pane_id.as_str()), world.pane.as_deref());
            break;
        }
    }
}

#[then("the call fails remotely naming {pane}")]
fn then_remote_error(world: &RefCell<ClientWorld>, pane: String) {
    let world = world.borrow();
    match world.call_error.as_ref() {
        Some(ClientError::Remote { op, message }) => {
            assert_eq!(*op, Op::ResizePane);
            assert!(message.contains(&pane), "unexpected message: {message}");
        }
        other => panic!("expected a remote error, got {other:?}"),
    }
    assert!(!world.client().is_closed());
}

#[then("it reports that no daemon was running")]
fn then_not_running(world: &RefCell<ClientWorld>) {
    let world = world.borrow();
    match world.lifecycle.as_ref() {
        Some(Ok(stopped)) => assert!(!stopped),
        other => panic!("expected Ok(false), got {other:?}"),
    }
}

#[then("launching the daemon fails")]
fn then_launch_fails(world: &RefCell<ClientWorld>) {
    let world = world.borrow();
    match world.lifecycle.as_ref() {
        Some(Err(LifecycleError::LaunchDaemon { binary, .. })) => {
            assert!(binary.to_string_lossy().ends_with("peakyd"));
        }
        other => panic!("expected LaunchDaemon, got {other:?}"),
    }
}

#[scenario(path = "tests/features/client_calls.feature")]
fn client_calls(#[from(world)] world: RefCell<ClientWorld>) {
    drop(world);
}
