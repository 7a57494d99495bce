//! Daemon-wide table of live connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use peaky_protocol::Event;
use tracing::debug;

use super::{CONNECTION_TARGET, Connection};

/// Live connections keyed by identifier.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<u64, Arc<Connection>>>,
    next_id: AtomicU64,
    closing: AtomicBool,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next connection identifier, starting at 1.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Adds `connection`. Once [`ConnectionRegistry::close_all`] ran the
    /// connection is closed instead and `false` is returned.
    pub fn register(&self, connection: Arc<Connection>) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.closing.load(Ordering::SeqCst) {
            drop(connections);
            connection.close();
            return false;
        }
        connections.insert(connection.id(), connection);
        true
    }

    /// Removes the connection with `id`.
    pub fn deregister(&self, id: u64) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Queues `event` on every registered connection.
    pub fn broadcast(&self, event: &Event) {
        for connection in self.snapshot() {
            connection.push_event(event.clone());
        }
    }

    /// Closes and removes every connection and refuses new ones. Returns how
    /// many were open.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.closing.store(true, Ordering::SeqCst);
            connections.drain().map(|(_, connection)| connection).collect()
        };
        for connection in &drained {
            connection.close();
        }
        debug!(
            target: CONNECTION_TARGET,
            count = drained.len(),
            "closed all connections"
        );
        drained.len()
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
