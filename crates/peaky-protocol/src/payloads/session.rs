//! Handshake, snapshot and session lifecycle payloads.

use serde::{Deserialize, Serialize};

/// Opens a connection handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloRequest {
    /// Caller protocol version.
    pub version: String,
    /// Free-form caller identity for logs.
    pub client_id: String,
}

/// Acknowledges a handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloResponse {
    /// Daemon version.
    pub version: String,
    /// Daemon process identifier.
    pub pid: u32,
}

/// Names of every live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionNamesResponse {
    /// Session names in creation order.
    pub names: Vec<String>,
}

/// Requests a dashboard snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotRequest {
    /// Number of trailing output lines to include per pane.
    pub preview_lines: usize,
}

/// One pane inside a [`SessionSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSnapshot {
    /// Stable pane identifier.
    pub id: String,
    /// Position within the session.
    pub index: String,
    /// Pane title.
    pub title: String,
    /// Whether the pane holds the session's focus.
    pub active: bool,
    /// Tags attached to the pane.
    pub tags: Vec<String>,
    /// Trailing output lines.
    pub preview: Vec<String>,
}

/// One session inside a [`SnapshotResponse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    /// Session name.
    pub name: String,
    /// Working directory.
    pub path: String,
    /// Layout the session was started from.
    pub layout_name: String,
    /// Panes in index order.
    pub panes: Vec<PaneSnapshot>,
}

/// Dashboard snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotResponse {
    /// Manager state version; bumps on every structural change.
    pub version: u64,
    /// Sessions in creation order.
    pub sessions: Vec<SessionSnapshot>,
}

/// Starts a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSessionRequest {
    /// Session name.
    pub name: String,
    /// Working directory.
    pub path: String,
    /// Layout to apply.
    pub layout_name: String,
}

/// Confirms session creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSessionResponse {
    /// Session name.
    pub name: String,
    /// Working directory.
    pub path: String,
    /// Layout applied.
    pub layout_name: String,
}

/// Stops a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillSessionRequest {
    /// Session name.
    pub name: String,
}

/// Renames a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameSessionRequest {
    /// Current name.
    pub old_name: String,
    /// Desired name.
    pub new_name: String,
}

/// Confirms a session rename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameSessionResponse {
    /// Name now in effect.
    pub new_name: String,
}

/// Moves the daemon's focus to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFocusRequest {
    /// Session name.
    pub name: String,
}
