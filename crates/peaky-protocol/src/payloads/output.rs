//! Pane output, scrollback, action history and pattern-wait payloads.

use serde::{Deserialize, Serialize};

/// One line of pane output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLine {
    /// Monotonic per-pane sequence number, starting at 1.
    pub seq: u64,
    /// Line text without the trailing newline.
    pub text: String,
    /// Capture time in unix milliseconds.
    pub at_unix_ms: i64,
}

/// Reads recent pane output.
///
/// With `since_seq == 0`, a positive `limit` and `wait` unset, the response
/// holds the last `limit` lines. Otherwise it holds the lines after
/// `since_seq`; with `wait` set an empty result blocks until output arrives
/// or the daemon's operation timeout elapses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneOutputRequest {
    /// Target pane.
    pub pane_id: String,
    /// Return only lines with a larger sequence.
    pub since_seq: u64,
    /// Maximum number of lines; zero means no limit.
    pub limit: usize,
    /// Block until at least one line is available.
    pub wait: bool,
}

/// Pane output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneOutputResponse {
    /// Target pane.
    pub pane_id: String,
    /// Lines in sequence order.
    pub lines: Vec<OutputLine>,
    /// Sequence to pass as `since_seq` on the next read.
    pub next_seq: u64,
    /// Older lines were dropped to satisfy the limit or the retention bound.
    pub truncated: bool,
}

/// Reads a pane's scrollback as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSnapshotRequest {
    /// Target pane.
    pub pane_id: String,
    /// Number of trailing rows; zero means all retained rows.
    pub rows: usize,
}

/// Scrollback text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSnapshotResponse {
    /// Target pane.
    pub pane_id: String,
    /// Rows requested.
    pub rows: usize,
    /// Newline-joined rows.
    pub content: String,
    /// More rows were retained than returned.
    pub truncated: bool,
}

/// One recorded pane action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneActionEntry {
    /// Record time in unix milliseconds.
    pub at_unix_ms: i64,
    /// Action name such as `focus` or `tag.add`.
    pub action: String,
    /// Human-readable summary.
    pub summary: String,
    /// Command text, when the action ran one.
    pub command: String,
    /// Outcome such as `ok` or `failed`.
    pub status: String,
}

/// Reads a pane's action history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneHistoryRequest {
    /// Target pane.
    pub pane_id: String,
    /// Maximum entries, most recent kept; zero means all.
    pub limit: usize,
    /// Only entries recorded at or after this unix millisecond; zero means all.
    pub since_unix_ms: i64,
}

/// Pane action history in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneHistoryResponse {
    /// Target pane.
    pub pane_id: String,
    /// Entries, oldest first.
    pub entries: Vec<PaneActionEntry>,
}

/// Waits for pane output matching a regular expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneWaitRequest {
    /// Target pane.
    pub pane_id: String,
    /// Regular expression matched against each new line.
    pub pattern: String,
    /// Wait bound in milliseconds; zero waits until the connection closes.
    pub timeout_ms: u64,
}

/// Outcome of a pattern wait.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneWaitResponse {
    /// Target pane.
    pub pane_id: String,
    /// Pattern as trimmed by the daemon.
    pub pattern: String,
    /// A line matched before the timeout.
    pub matched: bool,
    /// The first matching line.
    pub matched_line: String,
    /// Time spent waiting in milliseconds.
    pub elapsed_ms: u64,
}
