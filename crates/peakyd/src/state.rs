//! State shared by every connection of one daemon instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use peaky_protocol::payloads::PaneActionEntry;
use peaky_protocol::{Event, EventType};
use tracing::trace;

use crate::connection::ConnectionRegistry;
use crate::eventlog::{ActionLog, EventLog, TimeRange, now_unix_ms};
use crate::manager::SessionManager;
use crate::relay::RelayRegistry;

const STATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::state");

/// The session and pane a client last focused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Focus {
    /// Focused session, empty when unknown.
    pub session: String,
    /// Focused pane, empty when unknown.
    pub pane: String,
}

/// Daemon-wide state reached by handlers and connection loops.
pub struct DaemonState {
    manager: Arc<dyn SessionManager>,
    version: String,
    pid: u32,
    events: Mutex<EventLog>,
    actions: Mutex<ActionLog>,
    focus: Mutex<Focus>,
    relays: RelayRegistry,
    connections: ConnectionRegistry,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DaemonState {
    /// Creates state around `manager`, reporting `version` in handshakes.
    #[must_use]
    pub fn new(manager: Arc<dyn SessionManager>, version: impl Into<String>) -> Self {
        Self {
            manager,
            version: version.into(),
            pid: std::process::id(),
            events: Mutex::new(EventLog::default()),
            actions: Mutex::new(ActionLog::default()),
            focus: Mutex::new(Focus::default()),
            relays: RelayRegistry::new(),
            connections: ConnectionRegistry::new(),
        }
    }

    /// Session engine.
    #[must_use]
    pub fn manager(&self) -> &Arc<dyn SessionManager> {
        &self.manager
    }

    /// Version reported by `hello`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Process identifier reported by `hello`.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Running relays.
    #[must_use]
    pub const fn relays(&self) -> &RelayRegistry {
        &self.relays
    }

    /// Live connections.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Records `event` and queues it on every connection. A zero timestamp
    /// is replaced with the current time.
    pub fn publish(&self, mut event: Event) {
        if event.at_unix_ms == 0 {
            event.at_unix_ms = now_unix_ms();
        }
        trace!(
            target: STATE_TARGET,
            event = %event.event_type,
            pane = %event.pane_id,
            "publishing event"
        );
        lock(&self.events).add(event.clone());
        self.connections.broadcast(&event);
    }

    /// Logged events within `range`, filtered by type.
    #[must_use]
    pub fn replay(&self, range: TimeRange, limit: usize, types: &[EventType]) -> Vec<Event> {
        lock(&self.events).list(range, limit, types)
    }

    /// Appends an entry to the pane's action history.
    pub fn record_action(&self, pane_id: &str, action: &str, summary: &str, status: &str) {
        let entry = PaneActionEntry {
            at_unix_ms: now_unix_ms(),
            action: action.to_owned(),
            summary: summary.to_owned(),
            command: String::new(),
            status: status.to_owned(),
        };
        lock(&self.actions).add(pane_id, entry);
    }

    /// The pane's action history.
    #[must_use]
    pub fn pane_history(&self, pane_id: &str, since_unix_ms: i64, limit: usize) -> Vec<PaneActionEntry> {
        lock(&self.actions).list(pane_id, since_unix_ms, limit)
    }

    /// Current focus.
    #[must_use]
    pub fn focus(&self) -> Focus {
        lock(&self.focus).clone()
    }

    /// Focuses a session; the focused pane is left untouched.
    pub fn focus_session(&self, name: &str) {
        lock(&self.focus).session = name.to_owned();
    }

    /// Focuses a pane and, when known, the session holding it.
    pub fn focus_pane(&self, pane_id: &str, session: Option<&str>) {
        let mut focus = lock(&self.focus);
        focus.pane = pane_id.to_owned();
        if let Some(session) = session {
            focus.session = session.to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::manager::MemoryManager;

    fn state() -> DaemonState {
        DaemonState::new(Arc::new(MemoryManager::new()), "test")
    }

    #[rstest]
    fn publish_stamps_and_logs_events() {
        let state = state();
        state.publish(Event::new(EventType::Toast, 0).with_detail("hi"));
        let events = state.replay(TimeRange::default(), 0, &[]);
        assert_eq!(events.len(), 1);
        assert!(events.first().is_some_and(|event| event.at_unix_ms > 0));
    }

    #[rstest]
    fn focusing_a_pane_keeps_the_session_when_unknown() {
        let state = state();
        state.focus_session("alpha");
        state.focus_pane("p-3", None);
        assert_eq!(
            state.focus(),
            Focus {
                session: "alpha".to_owned(),
                pane: "p-3".to_owned()
            }
        );
        state.focus_pane("p-4", Some("beta"));
        assert_eq!(state.focus().session, "beta");
    }

    #[rstest]
    fn actions_are_recorded_per_pane() {
        let state = state();
        state.record_action("p-1", "signal", "SIGINT", "ok");
        let history = state.pane_history("p-1", 0, 0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().map(|entry| entry.action.as_str()), Some("signal"));
        assert!(state.pane_history("p-2", 0, 0).is_empty());
    }
}
