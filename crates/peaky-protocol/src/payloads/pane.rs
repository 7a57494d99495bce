//! Pane lifecycle, input, focus, tag and signal payloads.

use serde::{Deserialize, Serialize};

/// Retitles a pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenamePaneRequest {
    /// Owning session.
    pub session_name: String,
    /// Pane position within the session.
    pub pane_index: String,
    /// Desired title.
    pub new_title: String,
}

/// Splits a pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitPaneRequest {
    /// Owning session.
    pub session_name: String,
    /// Pane to split.
    pub pane_index: String,
    /// Split side by side instead of stacked.
    pub vertical: bool,
    /// Share of the space given to the new pane (1..=99; 0 means half).
    pub percent: u8,
}

/// Reports the pane created by a split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitPaneResponse {
    /// Index of the new pane.
    pub new_index: String,
}

/// Closes a pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosePaneRequest {
    /// Owning session.
    pub session_name: String,
    /// Pane position within the session.
    pub pane_index: String,
}

/// Swaps two panes within a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapPanesRequest {
    /// Owning session.
    pub session_name: String,
    /// First pane index.
    pub pane_a: String,
    /// Second pane index.
    pub pane_b: String,
}

/// Forwards raw input bytes to a pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendInputRequest {
    /// Target pane.
    pub pane_id: String,
    /// Bytes written to the pane's input.
    pub input: Vec<u8>,
}

/// Kind of pointer action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseAction {
    /// Unrecognised action.
    #[default]
    Unknown,
    /// Button pressed.
    Press,
    /// Button released.
    Release,
    /// Pointer moved.
    Motion,
}

/// Serialisable pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouseEventPayload {
    /// Zero-based column.
    pub x: u16,
    /// Zero-based row.
    pub y: u16,
    /// Button number.
    pub button: u8,
    /// Action kind.
    pub action: MouseAction,
    /// Shift held.
    pub shift: bool,
    /// Alt held.
    pub alt: bool,
    /// Control held.
    pub ctrl: bool,
    /// Wheel event.
    pub wheel: bool,
}

/// Forwards a pointer event to a pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMouseRequest {
    /// Target pane.
    pub pane_id: String,
    /// Pointer event.
    pub event: MouseEventPayload,
}

/// Resizes a pane's terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizePaneRequest {
    /// Target pane.
    pub pane_id: String,
    /// Width in cells.
    pub cols: u16,
    /// Height in cells.
    pub rows: u16,
}

/// Moves the daemon's focus to a pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneFocusRequest {
    /// Target pane.
    pub pane_id: String,
}

/// Adds, removes or lists pane tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneTagRequest {
    /// Target pane.
    pub pane_id: String,
    /// Tags to add or remove; ignored when listing.
    pub tags: Vec<String>,
}

/// Tags attached to a pane after the operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneTagListResponse {
    /// Target pane.
    pub pane_id: String,
    /// Sorted tags.
    pub tags: Vec<String>,
}

/// Delivers a signal to a pane's process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSignalRequest {
    /// Target pane.
    pub pane_id: String,
    /// Signal name such as `TERM` or `SIGINT`.
    pub signal: String,
}
