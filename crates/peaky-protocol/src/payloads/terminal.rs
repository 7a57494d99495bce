//! Scrollback, copy-mode and key handling payloads.

use serde::{Deserialize, Serialize};

/// Scrollback or copy-mode action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalAction {
    /// Unrecognised action.
    #[default]
    Unknown,
    /// Enter scrollback mode.
    EnterScrollback,
    /// Leave scrollback mode.
    ExitScrollback,
    /// Scroll up by `lines`.
    ScrollUp,
    /// Scroll down by `lines`.
    ScrollDown,
    /// Scroll up one page.
    PageUp,
    /// Scroll down one page.
    PageDown,
    /// Jump to the oldest retained line.
    ScrollTop,
    /// Jump back to live output.
    ScrollBottom,
    /// Enter copy mode.
    EnterCopyMode,
    /// Leave copy mode.
    ExitCopyMode,
    /// Move the copy cursor by `delta_x`/`delta_y`.
    CopyMove,
    /// Move the copy cursor up one page.
    CopyPageUp,
    /// Move the copy cursor down one page.
    CopyPageDown,
    /// Start or stop a selection.
    CopyToggleSelect,
    /// Return the selected text.
    CopyYank,
}

/// Runs a terminal action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalActionRequest {
    /// Target pane.
    pub pane_id: String,
    /// Action to run.
    pub action: TerminalAction,
    /// Horizontal copy-cursor movement.
    pub delta_x: i32,
    /// Vertical copy-cursor movement.
    pub delta_y: i32,
    /// Line count for scroll actions; zero means one.
    pub lines: usize,
}

/// Optional data returned by an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalActionResponse {
    /// Target pane.
    pub pane_id: String,
    /// Yanked text, for [`TerminalAction::CopyYank`].
    pub text: String,
}

/// Toast severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    /// Informational.
    #[default]
    Info,
    /// Something succeeded.
    Success,
    /// Something needs attention.
    Warning,
}

/// Asks the daemon to interpret a key in scrollback or copy mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalKeyRequest {
    /// Target pane.
    pub pane_id: String,
    /// Key name such as `up`, `pgdown` or `q`.
    pub key: String,
    /// The key toggles scrollback mode.
    pub scrollback_toggle: bool,
    /// The key toggles copy mode.
    pub copy_toggle: bool,
}

/// How the daemon handled a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalKeyResponse {
    /// The key was consumed by a mode.
    pub handled: bool,
    /// Toast text to show, if any.
    pub toast: String,
    /// Toast severity.
    pub toast_level: ToastLevel,
    /// Text yanked by the key, if any.
    pub yank_text: String,
}
