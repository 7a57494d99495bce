//! The running daemon: socket listener, shared state and the event loop.
//!
//! [`Daemon::start`] binds the socket, wires the connection manager to a
//! fresh [`DaemonState`] and starts a thread that turns session-manager
//! changes into broadcast events. [`Daemon::stop`] tears all of it down in
//! reverse order.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use camino::{Utf8Path, Utf8PathBuf};
use peaky_config::{SocketPreparationError, prepare_socket_directory};
use peaky_protocol::payloads::ToastLevel;
use peaky_protocol::{Event, EventType};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::dispatch::Router;
use crate::manager::{ManagerEvent, SessionManager};
use crate::state::DaemonState;
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

/// Errors raised while starting or stopping the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The socket directory could not be prepared.
    #[error("failed to prepare daemon socket: {0}")]
    Socket(#[from] SocketPreparationError),
    /// Binding or running the listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The event loop thread could not be started.
    #[error("failed to start event loop: {source}")]
    Spawn {
        /// Operating system error.
        #[source]
        source: io::Error,
    },
}

/// A daemon accepting connections on its socket.
pub struct Daemon {
    socket: Utf8PathBuf,
    state: Arc<DaemonState>,
    listener: ListenerHandle,
    events: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Binds `socket` and starts serving `manager`.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Listener`] wrapping
    /// [`ListenerError::InUse`] when another daemon answers on the socket,
    /// or the error raised while preparing or binding it.
    pub fn start(
        socket: &Utf8Path,
        manager: Arc<dyn SessionManager>,
        version: &str,
    ) -> Result<Self, DaemonError> {
        prepare_socket_directory(socket)?;
        let listener = SocketListener::bind(socket)?;
        let state = Arc::new(DaemonState::new(manager, version));

        let events = match state.manager().take_events() {
            Some(receiver) => {
                let state = Arc::clone(&state);
                let handle = thread::Builder::new()
                    .name("peakyd-events".to_owned())
                    .spawn(move || run_event_loop(&state, &receiver))
                    .map_err(|source| DaemonError::Spawn { source })?;
                Some(handle)
            }
            None => None,
        };

        let handler = Arc::new(ConnectionManager::new(
            Arc::clone(&state),
            Arc::new(Router::new()),
        ));
        let listener = match listener.start(handler) {
            Ok(handle) => handle,
            Err(error) => {
                state.manager().close();
                join_events(events);
                return Err(error.into());
            }
        };
        info!(target: DAEMON_TARGET, socket = %socket, version, "daemon started");
        Ok(Self {
            socket: socket.to_path_buf(),
            state,
            listener,
            events,
        })
    }

    /// Socket the daemon listens on.
    #[must_use]
    pub fn socket(&self) -> &Utf8Path {
        &self.socket
    }

    /// Shared daemon state.
    #[must_use]
    pub const fn state(&self) -> &Arc<DaemonState> {
        &self.state
    }

    /// Stops accepting, closes every connection and relay, shuts the
    /// session manager down and waits for the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept loop panicked;
    /// the remaining teardown still runs.
    pub fn stop(self) -> Result<(), DaemonError> {
        let Self {
            state,
            listener,
            events,
            socket,
        } = self;
        listener.shutdown();
        let joined = listener.join();
        let relays = state.relays().stop_all();
        let connections = state.connections().close_all();
        state.manager().close();
        join_events(events);
        info!(
            target: DAEMON_TARGET,
            socket = %socket,
            connections,
            relays,
            "daemon stopped"
        );
        joined.map_err(DaemonError::from)
    }
}

fn join_events(events: Option<JoinHandle<()>>) {
    if let Some(handle) = events
        && handle.join().is_err()
    {
        warn!(target: DAEMON_TARGET, "event loop panicked");
    }
}

fn run_event_loop(state: &DaemonState, events: &Receiver<ManagerEvent>) {
    for change in events {
        if let Some(event) = broadcast_event(change) {
            state.publish(event);
        }
    }
    debug!(target: DAEMON_TARGET, "manager event stream ended");
}

/// Maps a session-manager change to the event clients receive. Toasts
/// without text are dropped.
fn broadcast_event(change: ManagerEvent) -> Option<Event> {
    match change {
        ManagerEvent::Updated { pane_id, seq } => Some(
            Event::new(EventType::PaneUpdated, 0)
                .with_pane(pane_id)
                .with_update_seq(seq),
        ),
        ManagerEvent::MetaUpdated { pane_id } => {
            Some(Event::new(EventType::PaneMetaChanged, 0).with_pane(pane_id))
        }
        ManagerEvent::Toast { pane_id, text } => {
            let text = text.trim();
            (!text.is_empty()).then(|| {
                Event::new(EventType::Toast, 0)
                    .with_pane(pane_id)
                    .with_detail(text)
                    .with_toast_level(ToastLevel::Success)
            })
        }
    }
}
