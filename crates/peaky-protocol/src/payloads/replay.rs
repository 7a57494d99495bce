//! Event log replay payloads.

use serde::{Deserialize, Serialize};

use crate::envelope::EventType;
use crate::event::Event;

/// Reads recent daemon events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsReplayRequest {
    /// Lower time bound in unix milliseconds; zero disables it.
    pub since_unix_ms: i64,
    /// Upper time bound in unix milliseconds; zero disables it.
    pub until_unix_ms: i64,
    /// Most recent matches to return; zero returns all.
    pub limit: usize,
    /// Event types to include; empty includes every type.
    pub types: Vec<EventType>,
}

/// Replayed events in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsReplayResponse {
    /// Events, oldest first.
    pub events: Vec<Event>,
}
