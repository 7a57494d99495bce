//! Bounded histories of daemon events and per-pane actions.
//!
//! Both logs drop their oldest entry once full. Listing walks entries in
//! chronological order, applies the time range and type filters and keeps
//! the most recent `limit` matches.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use peaky_protocol::payloads::PaneActionEntry;
use peaky_protocol::{Event, EventType};

/// Events retained daemon-wide.
pub const EVENT_LOG_CAPACITY: usize = 1024;
/// Actions retained per pane.
pub const ACTION_LOG_CAPACITY: usize = 128;

/// Wall-clock time in unix milliseconds.
#[must_use]
pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Inclusive time bounds; zero disables a bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Earliest accepted timestamp.
    pub since_unix_ms: i64,
    /// Latest accepted timestamp.
    pub until_unix_ms: i64,
}

impl TimeRange {
    const fn contains(self, at_unix_ms: i64) -> bool {
        (self.since_unix_ms == 0 || at_unix_ms >= self.since_unix_ms)
            && (self.until_unix_ms == 0 || at_unix_ms <= self.until_unix_ms)
    }
}

#[derive(Debug)]
struct Ring<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn add(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn list(&self, limit: usize, mut keep: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut matches: Vec<T> = self
            .entries
            .iter()
            .rev()
            .filter(|entry| keep(entry))
            .take(if limit == 0 { usize::MAX } else { limit })
            .cloned()
            .collect();
        matches.reverse();
        matches
    }
}

/// Daemon-wide event history served by `events_replay`.
#[derive(Debug)]
pub struct EventLog {
    ring: Ring<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// Creates a log holding at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Ring::new(capacity),
        }
    }

    /// Records an event, evicting the oldest once full.
    pub fn add(&mut self, event: Event) {
        self.ring.add(event);
    }

    /// Events within `range` whose type is in `types` (empty matches all),
    /// at most the `limit` most recent (zero means unlimited), oldest first.
    #[must_use]
    pub fn list(&self, range: TimeRange, limit: usize, types: &[EventType]) -> Vec<Event> {
        self.ring.list(limit, |event| {
            range.contains(event.at_unix_ms)
                && (types.is_empty() || types.contains(&event.event_type))
        })
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.entries.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.entries.is_empty()
    }
}

/// Per-pane action history served by `pane_history`.
#[derive(Debug)]
pub struct ActionLog {
    panes: HashMap<String, Ring<PaneActionEntry>>,
    capacity: usize,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::with_capacity(ACTION_LOG_CAPACITY)
    }
}

impl ActionLog {
    /// Creates a log holding at most `capacity` actions per pane.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            panes: HashMap::new(),
            capacity,
        }
    }

    /// Records an action for `pane_id`, creating its history on first use.
    pub fn add(&mut self, pane_id: &str, entry: PaneActionEntry) {
        let capacity = self.capacity;
        self.panes
            .entry(pane_id.to_owned())
            .or_insert_with(|| Ring::new(capacity))
            .add(entry);
    }

    /// Actions for `pane_id` recorded at or after `since_unix_ms` (zero
    /// disables the bound), at most the `limit` most recent, oldest first.
    #[must_use]
    pub fn list(&self, pane_id: &str, since_unix_ms: i64, limit: usize) -> Vec<PaneActionEntry> {
        let range = TimeRange {
            since_unix_ms,
            until_unix_ms: 0,
        };
        self.panes.get(pane_id).map_or_else(Vec::new, |ring| {
            ring.list(limit, |entry| range.contains(entry.at_unix_ms))
        })
    }
}
