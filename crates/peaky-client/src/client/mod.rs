//! Connection to a running daemon.
//!
//! A [`Client`] mirrors the daemon's read/write split. A reader thread
//! routes responses to the call waiting on their correlation ID and feeds
//! events into a deduplicating queue, which a delivery thread drains into the
//! stream returned by [`Client::events`]. Calls are synchronous: the caller
//! blocks until its response arrives, its context finishes, or the
//! connection closes.

mod events;
mod pending;
mod reader;
#[cfg(test)]
mod tests;

use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use camino::Utf8Path;
use peaky_protocol::payloads::{HelloRequest, HelloResponse};
use peaky_protocol::transport::{self, EnvelopeWriter, ShutdownHandle};
use peaky_protocol::{
    Context, Envelope, Event, OPERATION_TIMEOUT, Op, decode_payload, encode_payload,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::ClientError;

use self::events::EventPump;
use self::pending::PendingTable;

pub(crate) const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// State shared with the reader and delivery threads.
#[derive(Debug, Default)]
struct Shared {
    pending: PendingTable,
    events: EventPump,
    closed: AtomicBool,
}

impl Shared {
    /// Marks the connection closed. Returns `true` the first time.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let failed = self.pending.fail_all();
        self.events.close();
        debug!(target: CLIENT_TARGET, failed, "client connection closed");
        true
    }
}

/// A live connection to the daemon.
#[derive(Debug)]
pub struct Client {
    shared: Arc<Shared>,
    writer: Mutex<EnvelopeWriter>,
    shutdown: ShutdownHandle,
    next_id: AtomicU64,
    events: Mutex<Option<Receiver<Event>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    delivery: Mutex<Option<JoinHandle<()>>>,
    daemon: HelloResponse,
}

impl Client {
    /// Connects to the daemon at `socket` and performs the `hello`
    /// handshake, announcing `version`.
    ///
    /// The dial is bounded by the protocol's dial timeout and the handshake
    /// by the operation timeout, each further limited by `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] when the socket cannot be reached and
    /// [`ClientError::Handshake`] when the daemon does not complete `hello`.
    pub fn dial(socket: &Utf8Path, version: &str, context: &Context) -> Result<Self, ClientError> {
        let stream = crate::transport::connect(socket, context)?;
        let mut client = Self::from_stream(stream)?;
        let request = HelloRequest {
            version: version.to_owned(),
            client_id: format!("{}-{}", env!("CARGO_PKG_NAME"), std::process::id()),
        };
        let handshake = context.with_timeout(OPERATION_TIMEOUT);
        match client.call_typed::<_, HelloResponse>(&handshake, Op::Hello, &request) {
            Ok(hello) => {
                debug!(
                    target: CLIENT_TARGET,
                    socket = %socket,
                    daemon_version = %hello.version,
                    daemon_pid = hello.pid,
                    "connected to daemon"
                );
                client.daemon = hello;
                Ok(client)
            }
            Err(error) => {
                client.close();
                Err(ClientError::Handshake {
                    source: Box::new(error),
                })
            }
        }
    }

    /// Wraps an already connected stream without performing a handshake.
    pub(crate) fn from_stream(stream: UnixStream) -> Result<Self, ClientError> {
        let spawn_error = |source| ClientError::Spawn { source };
        let (reader, writer) = transport::split(stream).map_err(spawn_error)?;
        let shutdown = writer.shutdown_handle().map_err(spawn_error)?;
        let shared = Arc::new(Shared::default());
        let (sender, receiver) = mpsc::sync_channel(0);

        let delivery = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("peaky-client-events".to_owned())
                .spawn(move || events::deliver(&shared.events, &sender))
                .map_err(spawn_error)?
        };
        let reader = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("peaky-client-read".to_owned())
                .spawn(move || reader::read_loop(reader, &shared))
        };
        let reader = match reader {
            Ok(handle) => handle,
            Err(source) => {
                shared.close();
                shutdown.shutdown();
                join_quietly(delivery, "delivery");
                return Err(ClientError::Spawn { source });
            }
        };

        Ok(Self {
            shared,
            writer: Mutex::new(writer),
            shutdown,
            next_id: AtomicU64::new(0),
            events: Mutex::new(Some(receiver)),
            reader: Mutex::new(Some(reader)),
            delivery: Mutex::new(Some(delivery)),
            daemon: HelloResponse::default(),
        })
    }

    /// Version and PID the daemon reported during the handshake.
    #[must_use]
    pub const fn daemon(&self) -> &HelloResponse {
        &self.daemon
    }

    /// Takes the stream of daemon events. Returns `None` after the first
    /// call. The stream ends once the client closes.
    pub fn events(&self) -> Option<Receiver<Event>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Returns `true` once the connection is closed, by either side.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of calls waiting for a response.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    /// Sends `op` with a raw payload and waits for the response payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the daemon reports a failure,
    /// [`ClientError::Cancelled`] or [`ClientError::DeadlineExceeded`] when
    /// `context` finishes first, and [`ClientError::Unavailable`] when the
    /// connection closes before the response arrives.
    pub fn call(&self, context: &Context, op: Op, payload: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        context.check()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = self.shared.pending.register(id)?;

        let request = Envelope::request(id, op, payload);
        if let Err(error) = self.lock_writer().write(&request, context) {
            self.shared.pending.remove(id);
            let error = ClientError::from(error);
            if matches!(error, ClientError::Frame(_) | ClientError::Unavailable) {
                debug!(target: CLIENT_TARGET, id, %op, %error, "request write failed");
                self.close();
            }
            return Err(error);
        }

        let response = match slot.wait(context) {
            Ok(response) => response,
            Err(error) => {
                self.shared.pending.remove(id);
                return Err(error);
            }
        };
        if response.is_error() {
            return Err(ClientError::Remote {
                op,
                message: response.error,
            });
        }
        Ok(response.payload)
    }

    /// Encodes `request`, calls `op` and decodes the response.
    ///
    /// # Errors
    ///
    /// As [`Client::call`], plus [`ClientError::Codec`] for payloads that do
    /// not (de)serialise.
    pub fn call_typed<Req, Resp>(&self, context: &Context, op: Op, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Default,
    {
        let payload = encode_payload(request)?;
        let response = self.call(context, op, payload)?;
        Ok(decode_payload(&response)?)
    }

    /// Closes the connection: fails every pending call, ends the event
    /// stream and waits for the reader and delivery threads. Idempotent.
    ///
    /// Once this returns, the event stream yields nothing further and reports
    /// disconnection.
    pub fn close(&self) {
        self.shared.close();
        self.shutdown.shutdown();
        for (slot, name) in [(&self.reader, "reader"), (&self.delivery, "delivery")] {
            let handle = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(handle) = handle {
                join_quietly(handle, name);
            }
        }
        drop(self.events());
    }

    fn lock_writer(&self) -> MutexGuard<'_, EnvelopeWriter> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn join_quietly(handle: JoinHandle<()>, name: &str) {
    if handle.join().is_err() {
        debug!(target: CLIENT_TARGET, thread = name, "client thread panicked");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
