//! The per-connection record shared by the serving threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use peaky_protocol::transport::ShutdownHandle;
use peaky_protocol::{Context, Envelope, Event, EventQueue, PushOutcome, WRITE_TIMEOUT};
use thiserror::Error;
use tracing::debug;

use super::{CONNECTION_TARGET, EVENT_QUEUE_CAPACITY, RESPONSE_QUEUE_CAPACITY};
use crate::pane_view::{PaneViewCache, PaneViewScheduler};

/// Errors raised while queueing outbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The connection is closing or closed.
    #[error("connection closed")]
    Closed,
    /// The response queue stayed full for the whole write timeout.
    #[error("response queue full")]
    BackPressure,
}

/// Next item for the write loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A response to a client request.
    Response(Envelope),
    /// A broadcast event.
    Event(Event),
}

#[derive(Debug)]
struct Outbound {
    responses: VecDeque<Envelope>,
    events: EventQueue,
}

/// State of one client connection.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    outbound: Mutex<Outbound>,
    changed: Condvar,
    scheduler: PaneViewScheduler,
    cache: PaneViewCache,
    closed: AtomicBool,
    context: Context,
    shutdown: Option<ShutdownHandle>,
}

impl Connection {
    /// Creates an open connection. `shutdown` closes the socket when the
    /// connection closes; without one only the queues are torn down.
    #[must_use]
    pub fn new(id: u64, shutdown: Option<ShutdownHandle>) -> Self {
        Self {
            id,
            outbound: Mutex::new(Outbound {
                responses: VecDeque::with_capacity(RESPONSE_QUEUE_CAPACITY),
                events: EventQueue::with_capacity(EVENT_QUEUE_CAPACITY),
            }),
            changed: Condvar::new(),
            scheduler: PaneViewScheduler::new(),
            cache: PaneViewCache::default(),
            closed: AtomicBool::new(false),
            context: Context::background(),
            shutdown,
        }
    }

    /// Daemon-wide connection identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Pane-view scheduler of this connection.
    #[must_use]
    pub const fn scheduler(&self) -> &PaneViewScheduler {
        &self.scheduler
    }

    /// Pane-view cache of this connection.
    #[must_use]
    pub const fn cache(&self) -> &PaneViewCache {
        &self.cache
    }

    /// Context cancelled when the connection closes.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Returns `true` once [`Connection::close`] ran.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Outbound> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a response for the write loop.
    ///
    /// Waits up to the write timeout for room when the queue is full and
    /// closes the connection if none appears.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] when the connection is closed and
    /// [`ConnectionError::BackPressure`] when the queue stayed full.
    pub fn send_response(&self, envelope: Envelope) -> Result<(), ConnectionError> {
        let deadline = Instant::now().checked_add(WRITE_TIMEOUT);
        let mut outbound = self.lock();
        loop {
            if self.is_closed() {
                return Err(ConnectionError::Closed);
            }
            if outbound.responses.len() < RESPONSE_QUEUE_CAPACITY {
                outbound.responses.push_back(envelope);
                drop(outbound);
                self.changed.notify_all();
                return Ok(());
            }
            let Some(remaining) = deadline.and_then(|at| at.checked_duration_since(Instant::now()))
            else {
                drop(outbound);
                debug!(
                    target: CONNECTION_TARGET,
                    connection = self.id,
                    "response queue full, closing connection"
                );
                self.close();
                return Err(ConnectionError::BackPressure);
            };
            outbound = self
                .changed
                .wait_timeout(outbound, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Queues `event`, coalescing it with a pending event of the same key.
    pub fn push_event(&self, event: Event) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Dropped;
        }
        let outcome = self.lock().events.push(event);
        match outcome {
            PushOutcome::Dropped => debug!(
                target: CONNECTION_TARGET,
                connection = self.id,
                "event queue full, dropping event"
            ),
            PushOutcome::Queued | PushOutcome::Replaced => self.changed.notify_all(),
        }
        outcome
    }

    /// Blocks until a response or event is ready. Responses go first.
    /// Returns `None` once the connection is closed.
    pub fn next_outgoing(&self) -> Option<Outgoing> {
        let mut outbound = self.lock();
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(response) = outbound.responses.pop_front() {
                drop(outbound);
                self.changed.notify_all();
                return Some(Outgoing::Response(response));
            }
            if let Some(event) = outbound.events.pop() {
                return Some(Outgoing::Event(event));
            }
            outbound = self
                .changed
                .wait(outbound)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Closes the connection, returning `true` on the first call only.
    ///
    /// Cancels every render, discards queued traffic, wakes blocked threads
    /// and shuts the socket down.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.context.cancel();
        self.scheduler.close();
        {
            let mut outbound = self.lock();
            outbound.responses.clear();
            outbound.events.clear();
        }
        self.changed.notify_all();
        if let Some(shutdown) = &self.shutdown {
            shutdown.shutdown();
        }
        debug!(target: CONNECTION_TARGET, connection = self.id, "connection closed");
        true
    }
}
