//! A running daemon on a temporary socket plus connected clients.

use std::os::unix::net::UnixStream;
use std::sync::Arc;

use camino::Utf8PathBuf;
use peaky_protocol::payloads::StartSessionRequest;
use peaky_protocol::transport::{self, EnvelopeReader, EnvelopeWriter};
use peaky_protocol::{Context, Envelope, EnvelopeKind, Op, encode_payload};
use serde::Serialize;
use tempfile::TempDir;

use crate::daemon::Daemon;
use crate::manager::{MemoryManager, SessionManager};

/// One client connection split into its halves.
pub struct TestClient {
    reader: EnvelopeReader,
    writer: EnvelopeWriter,
    next_id: u64,
}

impl TestClient {
    /// Sends `request` as `op`, returning the correlation ID used.
    pub fn send<T: Serialize>(&mut self, op: Op, request: &T) -> u64 {
        self.next_id += 1;
        let payload = encode_payload(request).expect("encode request");
        self.send_envelope(&Envelope::request(self.next_id, op, payload));
        self.next_id
    }

    pub fn send_envelope(&mut self, envelope: &Envelope) {
        self.writer
            .write(envelope, &Context::background())
            .expect("write envelope");
    }

    pub fn receive(&mut self) -> Envelope {
        self.reader.read().expect("read envelope")
    }

    /// Reads until the response to `id` arrives, keeping any events seen on
    /// the way.
    pub fn response_to(&mut self, id: u64, events: &mut Vec<Envelope>) -> Envelope {
        loop {
            let envelope = self.receive();
            if envelope.kind == EnvelopeKind::Response && envelope.id == id {
                return envelope;
            }
            if envelope.kind == EnvelopeKind::Event {
                events.push(envelope);
            }
        }
    }
}

/// Daemon serving a [`MemoryManager`] from a private directory.
pub struct DaemonWorld {
    _dir: TempDir,
    socket: Utf8PathBuf,
    pub manager: Arc<MemoryManager>,
    pub daemon: Option<Daemon>,
    pub clients: Vec<TestClient>,
}

impl DaemonWorld {
    pub fn start() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        let socket = root.join("daemon.sock");
        let manager = Arc::new(MemoryManager::new());
        let daemon = Daemon::start(&socket, manager.clone(), "0.0.0-test").expect("start daemon");
        Self {
            _dir: dir,
            socket,
            manager,
            daemon: Some(daemon),
            clients: Vec::new(),
        }
    }

    pub fn connect(&mut self) -> &mut TestClient {
        let stream = UnixStream::connect(&self.socket).expect("connect");
        let (reader, writer) = transport::split(stream).expect("split");
        self.clients.push(TestClient {
            reader,
            writer,
            next_id: 0,
        });
        self.clients.last_mut().expect("client just pushed")
    }

    pub fn client(&mut self, index: usize) -> &mut TestClient {
        self.clients.get_mut(index).expect("client connected")
    }

    /// Starts `name` through the manager and returns its first pane.
    pub fn start_session(&self, name: &str) -> String {
        self.manager
            .start_session(&StartSessionRequest {
                name: name.to_owned(),
                ..StartSessionRequest::default()
            })
            .expect("start session");
        self.manager
            .snapshot(0)
            .into_iter()
            .find(|session| session.name == name)
            .and_then(|session| session.panes.into_iter().next())
            .map(|pane| pane.id)
            .expect("first pane")
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        self.clients.clear();
        if let Some(daemon) = self.daemon.take() {
            let _ = daemon.stop();
        }
    }
}
