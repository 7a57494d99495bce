//! Serving loops for one accepted socket.

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use peaky_protocol::payloads::PaneViewRequest;
use peaky_protocol::transport::{self, EnvelopeReader, EnvelopeWriter};
use peaky_protocol::{Envelope, EnvelopeKind, FrameError, Op, decode_payload, encode_payload};
use tracing::{debug, trace, warn};

use super::{CONNECTION_TARGET, Connection, Outgoing};
use crate::dispatch::Router;
use crate::pane_view::{WORKERS, render_context, render_pane_view};
use crate::state::DaemonState;
use crate::transport::ConnectionHandler;

/// Serves client connections against the daemon state.
#[derive(Clone)]
pub struct ConnectionManager {
    state: Arc<DaemonState>,
    router: Arc<Router>,
}

impl ConnectionManager {
    /// Creates a manager routing requests through `router`.
    #[must_use]
    pub const fn new(state: Arc<DaemonState>, router: Arc<Router>) -> Self {
        Self { state, router }
    }

    fn serve(&self, stream: UnixStream) {
        let (reader, writer) = match transport::split(stream) {
            Ok(halves) => halves,
            Err(error) => {
                warn!(target: CONNECTION_TARGET, %error, "failed to prepare connection");
                return;
            }
        };
        let shutdown = match writer.shutdown_handle() {
            Ok(handle) => handle,
            Err(error) => {
                warn!(target: CONNECTION_TARGET, %error, "failed to prepare connection");
                return;
            }
        };
        let registry = self.state.connections();
        let connection = Arc::new(Connection::new(registry.next_id(), Some(shutdown)));
        if !registry.register(Arc::clone(&connection)) {
            debug!(
                target: CONNECTION_TARGET,
                connection = connection.id(),
                "daemon stopping, refusing connection"
            );
            return;
        }
        debug!(target: CONNECTION_TARGET, connection = connection.id(), "connection opened");

        let threads = self.spawn_threads(&connection, writer);
        if threads.len() == WORKERS + 1 {
            self.read_loop(&connection, reader);
        }

        connection.close();
        registry.deregister(connection.id());
        for handle in threads {
            if handle.join().is_err() {
                warn!(
                    target: CONNECTION_TARGET,
                    connection = connection.id(),
                    "connection thread panicked"
                );
            }
        }
    }

    fn spawn_threads(&self, connection: &Arc<Connection>, writer: EnvelopeWriter) -> Vec<JoinHandle<()>> {
        let mut threads = Vec::with_capacity(WORKERS + 1);
        let id = connection.id();
        let spawned = {
            let connection = Arc::clone(connection);
            thread::Builder::new()
                .name(format!("peakyd-write-{id}"))
                .spawn(move || write_loop(&connection, writer))
        };
        match spawned {
            Ok(handle) => threads.push(handle),
            Err(error) => {
                warn!(target: CONNECTION_TARGET, connection = id, %error, "failed to spawn writer");
                return threads;
            }
        }
        for worker in 0..WORKERS {
            let connection = Arc::clone(connection);
            let state = Arc::clone(&self.state);
            let spawned = thread::Builder::new()
                .name(format!("peakyd-view-{id}-{worker}"))
                .spawn(move || worker_loop(&state, &connection));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(error) => {
                    warn!(target: CONNECTION_TARGET, connection = id, %error, "failed to spawn render worker");
                    break;
                }
            }
        }
        threads
    }

    fn read_loop(&self, connection: &Connection, mut reader: EnvelopeReader) {
        loop {
            let envelope = match reader.read() {
                Ok(envelope) => envelope,
                Err(error) if error.is_timeout() => {
                    if connection.is_closed() {
                        return;
                    }
                    continue;
                }
                Err(FrameError::Closed) => {
                    debug!(target: CONNECTION_TARGET, connection = connection.id(), "client disconnected");
                    return;
                }
                Err(error) => {
                    if !connection.is_closed() {
                        debug!(
                            target: CONNECTION_TARGET,
                            connection = connection.id(),
                            %error,
                            "read failed"
                        );
                    }
                    return;
                }
            };
            if connection.is_closed() {
                return;
            }
            if envelope.kind != EnvelopeKind::Request {
                trace!(
                    target: CONNECTION_TARGET,
                    connection = connection.id(),
                    kind = ?envelope.kind,
                    "ignoring non-request envelope"
                );
                continue;
            }
            if let Some(request) = view_request(&envelope) {
                connection.scheduler().enqueue(envelope, request);
                continue;
            }
            let response = self.router.dispatch(&self.state, &envelope);
            if let Err(error) = connection.send_response(response) {
                debug!(target: CONNECTION_TARGET, connection = connection.id(), %error, "dropping response");
                return;
            }
        }
    }
}

impl ConnectionHandler for ConnectionManager {
    fn handle(&self, stream: UnixStream) {
        self.serve(stream);
    }
}

/// A `pane_view` request that names a pane goes to the scheduler; anything
/// else, including an undecodable payload, is answered by the router.
fn view_request(envelope: &Envelope) -> Option<PaneViewRequest> {
    if envelope.operation() != Some(Op::PaneView) {
        return None;
    }
    let mut request: PaneViewRequest = decode_payload(&envelope.payload).ok()?;
    let pane_id = request.pane_id.trim();
    if pane_id.is_empty() {
        return None;
    }
    request.pane_id = pane_id.to_owned();
    Some(request)
}

pub(super) fn worker_loop(state: &DaemonState, connection: &Connection) {
    let scheduler = connection.scheduler();
    while let Some(job) = scheduler.next() {
        let pane_id = job.pane_id().to_owned();
        let context = render_context(connection.context(), &job.request);
        scheduler.set_cancel(&job, context.cancel_handle());
        let started = Instant::now();
        let result = render_pane_view(
            state.manager().as_ref(),
            &context,
            &job.request,
            Some(connection.cache()),
        );
        scheduler.clear_cancel(&pane_id);

        if scheduler.is_latest(&pane_id, job.seq) {
            let response = Envelope::response_to(&job.envelope);
            let response = match result {
                Ok(view) => match encode_payload(&view) {
                    Ok(payload) => response.with_payload(payload),
                    Err(error) => response.with_error(format!("internal error: {error}")),
                },
                Err(error) => response.with_error(error.to_string()),
            };
            if let Err(error) = connection.send_response(response) {
                debug!(
                    target: CONNECTION_TARGET,
                    connection = connection.id(),
                    pane = %pane_id,
                    %error,
                    "dropping pane view"
                );
            }
        } else {
            trace!(
                target: CONNECTION_TARGET,
                connection = connection.id(),
                pane = %pane_id,
                seq = job.seq,
                elapsed_ms = started.elapsed().as_millis(),
                "discarding superseded render"
            );
        }
        scheduler.finish(&pane_id);
    }
}

fn write_loop(connection: &Connection, mut writer: EnvelopeWriter) {
    while let Some(outgoing) = connection.next_outgoing() {
        let envelope = match outgoing {
            Outgoing::Response(envelope) => envelope,
            Outgoing::Event(event) => match encode_payload(&event) {
                Ok(payload) => Envelope::event(event.event_type, payload),
                Err(error) => {
                    warn!(target: CONNECTION_TARGET, %error, "failed to encode event");
                    continue;
                }
            },
        };
        if let Err(error) = writer.write(&envelope, connection.context()) {
            if !connection.is_closed() {
                debug!(
                    target: CONNECTION_TARGET,
                    connection = connection.id(),
                    %error,
                    "write failed"
                );
            }
            connection.close();
            return;
        }
    }
}
