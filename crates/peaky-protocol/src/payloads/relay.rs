//! Relay management payloads.

use serde::{Deserialize, Serialize};

/// How a relay forwards output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Forward complete lines.
    #[default]
    Line,
    /// Forward raw bytes.
    Raw,
}

/// Relay lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    /// Forwarding.
    #[default]
    Running,
    /// Stopped by a caller.
    Stopped,
}

/// Relay definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Source pane.
    pub from_pane_id: String,
    /// Destination panes; resolved from `scope` when empty.
    pub to_pane_ids: Vec<String>,
    /// Scope selecting destinations: `all`, `session:<name>` or a pane ID.
    pub scope: String,
    /// Forwarding mode.
    pub mode: RelayMode,
}

/// Relay as reported by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayInfo {
    /// Relay identifier.
    pub id: String,
    /// Source pane.
    pub from_pane_id: String,
    /// Destination panes.
    pub to_pane_ids: Vec<String>,
    /// Forwarding mode.
    pub mode: RelayMode,
    /// Lifecycle state.
    pub status: RelayStatus,
    /// Creation time in unix milliseconds.
    pub created_at_unix_ms: i64,
}

/// Creates a relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayCreateRequest {
    /// Relay definition.
    pub config: RelayConfig,
}

/// Reports a created relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayCreateResponse {
    /// Created relay.
    pub relay: RelayInfo,
}

/// Lists relays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayListResponse {
    /// Relays in creation order.
    pub relays: Vec<RelayInfo>,
}

/// Stops one relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayStopRequest {
    /// Relay identifier.
    pub id: String,
}
