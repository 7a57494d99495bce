//! Asynchronous daemon events and the deduplicating queue that buffers them.
//!
//! Both ends of a connection buffer events in an [`EventQueue`]: the daemon
//! per connection before writing, the client before delivery. The queue keeps
//! at most one undelivered event per [`EventKey`]. A newer event with a
//! queued key replaces the payload in place, so consumers see the latest
//! value at the position the key was first seen.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::envelope::EventType;
use crate::payloads::ToastLevel;

/// Event broadcast from the daemon to its clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Explicit identity; takes precedence over `pane_id` for deduplication.
    pub id: String,
    /// Pane the event concerns.
    pub pane_id: String,
    /// Pane content sequence for [`EventType::PaneUpdated`]; zero otherwise.
    pub update_seq: u64,
    /// Session the event concerns.
    pub session: String,
    /// Creation time in unix milliseconds.
    pub at_unix_ms: i64,
    /// Free-form detail such as toast text or a relay identifier.
    pub detail: String,
    /// Toast severity; meaningful for [`EventType::Toast`] only.
    pub toast_level: ToastLevel,
}

impl Event {
    /// Builds an event of `event_type` stamped with `at_unix_ms`.
    #[must_use]
    pub fn new(event_type: EventType, at_unix_ms: i64) -> Self {
        Self {
            event_type,
            at_unix_ms,
            ..Self::default()
        }
    }

    /// Sets the explicit identity.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the pane.
    #[must_use]
    pub fn with_pane(mut self, pane_id: impl Into<String>) -> Self {
        self.pane_id = pane_id.into();
        self
    }

    /// Sets the session.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    /// Sets the pane content sequence.
    #[must_use]
    pub const fn with_update_seq(mut self, update_seq: u64) -> Self {
        self.update_seq = update_seq;
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Sets the toast severity.
    #[must_use]
    pub const fn with_toast_level(mut self, level: ToastLevel) -> Self {
        self.toast_level = level;
        self
    }

    /// Deduplication key: the explicit ID when present, else the pane.
    #[must_use]
    pub fn key(&self) -> EventKey {
        let subject = if self.id.is_empty() {
            EventSubject::Pane(self.pane_id.clone())
        } else {
            EventSubject::Id(self.id.clone())
        };
        EventKey {
            event_type: self.event_type,
            subject,
        }
    }
}

/// What an [`EventKey`] identifies besides the event type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventSubject {
    /// An explicit event identity.
    Id(String),
    /// A pane identifier (possibly empty for daemon-wide events).
    Pane(String),
}

/// Identity used to coalesce queued events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    /// Event type.
    pub event_type: EventType,
    /// Explicit ID or pane.
    pub subject: EventSubject,
}

/// Result of [`EventQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The key was new and the event joined the back of the queue.
    Queued,
    /// The key was queued; its payload was replaced in place.
    Replaced,
    /// The key was new but the queue was full.
    Dropped,
}

/// Ordered, key-deduplicating, bounded event buffer.
///
/// The queue is not synchronised; owners wrap it in their own lock.
#[derive(Debug)]
pub struct EventQueue {
    order: VecDeque<EventKey>,
    pending: HashMap<EventKey, Event>,
    capacity: usize,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` distinct keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            pending: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Queues `event`, coalescing it with any pending event of the same key.
    pub fn push(&mut self, event: Event) -> PushOutcome {
        let key = event.key();
        if let Some(slot) = self.pending.get_mut(&key) {
            *slot = event;
            return PushOutcome::Replaced;
        }
        if self.order.len() >= self.capacity {
            return PushOutcome::Dropped;
        }
        self.order.push_back(key.clone());
        self.pending.insert(key, event);
        PushOutcome::Queued
    }

    /// Removes and returns the oldest pending event.
    pub fn pop(&mut self) -> Option<Event> {
        while let Some(key) = self.order.pop_front() {
            if let Some(event) = self.pending.remove(&key) {
                return Some(event);
            }
        }
        None
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Discards every pending event.
    pub fn clear(&mut self) {
        self.order.clear();
        self.pending.clear();
    }
}
