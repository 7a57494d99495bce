//! Capabilities the daemon consumes from the session engine.
//!
//! The daemon never touches PTYs or terminal emulation directly. It reaches
//! the engine through two narrow seams: [`SessionManager`] for session and
//! pane lifecycle, input and output history, and [`PaneWindow`] for the
//! resize-and-render surface the pane-view pipeline drives. [`MemoryManager`]
//! is the in-process implementation used by the binary and the tests.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use peaky_protocol::Context;
use peaky_protocol::payloads::{
    ColorProfile, Frame, MouseEventPayload, OutputLine, PaneViewMode, SessionSnapshot,
    StartSessionRequest, StartSessionResponse, TerminalActionRequest, TerminalActionResponse,
    TerminalKeyRequest, TerminalKeyResponse,
};

mod errors;
mod memory;
mod window;

pub use errors::{ManagerError, RenderError};
pub use memory::MemoryManager;
pub use window::MemoryWindow;

/// Grid geometry and styling for one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Columns, at least one.
    pub cols: u16,
    /// Rows, at least one.
    pub rows: u16,
    /// Output encoding of the rendered lines.
    pub mode: PaneViewMode,
    /// Whether the cursor should be reported visible.
    pub show_cursor: bool,
    /// Colour depth the caller can display.
    pub color_profile: ColorProfile,
}

/// Render surface of a single pane.
///
/// A window is shared by every connection observing the pane. Concurrent
/// renders at different sizes race on [`PaneWindow::resize`]; the last
/// resize wins.
#[cfg_attr(test, mockall::automock)]
pub trait PaneWindow: Send + Sync {
    /// Resizes the pane's grid.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError`] when the engine rejects the size.
    fn resize(&self, cols: u16, rows: u16) -> Result<(), ManagerError>;

    /// Monotonic counter bumped whenever the pane's content changes.
    fn update_seq(&self) -> u64;

    /// Renders through the engine's frame cache.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Context`] when `context` finishes first.
    fn render_cached(&self, context: &Context, options: &RenderOptions)
    -> Result<Frame, RenderError>;

    /// Renders from live terminal state, bypassing any frame cache.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Context`] when `context` finishes first.
    fn render_direct(&self, context: &Context, options: &RenderOptions)
    -> Result<Frame, RenderError>;

    /// Whether the application in the pane enabled mouse reporting.
    fn has_pointer_mode(&self) -> bool;

    /// Whether mouse reporting includes motion events.
    fn allows_pointer_motion(&self) -> bool;
}

/// Change notifications emitted by the session engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Pane content changed.
    Updated {
        /// Pane that changed.
        pane_id: String,
        /// Content sequence after the change.
        seq: u64,
    },
    /// Pane title, tags or other metadata changed.
    MetaUpdated {
        /// Pane that changed.
        pane_id: String,
    },
    /// The engine wants a notification shown to the user.
    Toast {
        /// Pane the notification concerns.
        pane_id: String,
        /// Notification text.
        text: String,
    },
}

/// Lines returned by [`SessionManager::output_since`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSince {
    /// Lines with a sequence greater than the requested one.
    pub lines: Vec<OutputLine>,
    /// Sequence a follow-up read should pass.
    pub next_seq: u64,
    /// Whether older lines were evicted before they could be read.
    pub truncated: bool,
}

/// Text returned by [`SessionManager::scrollback_snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollbackSnapshot {
    /// The most recent rows joined with newlines.
    pub content: String,
    /// Whether more rows existed than were returned.
    pub truncated: bool,
}

/// Session and pane lifecycle operations offered by the engine.
#[cfg_attr(test, mockall::automock)]
pub trait SessionManager: Send + Sync {
    /// Names of every live session, in creation order.
    fn session_names(&self) -> Vec<String>;

    /// Dashboard view of every session with up to `preview_lines` of output
    /// per pane.
    fn snapshot(&self, preview_lines: usize) -> Vec<SessionSnapshot>;

    /// Counter bumped on every structural change.
    fn version(&self) -> u64;

    /// Starts a session.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::SessionExists`] for a duplicate name.
    fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionResponse, ManagerError>;

    /// Kills a session and all its panes.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::SessionNotFound`] for an unknown name.
    fn kill_session(&self, name: &str) -> Result<(), ManagerError>;

    /// Renames a session.
    ///
    /// # Errors
    ///
    /// Fails when the old name is unknown or the new one is taken.
    fn rename_session(&self, old_name: &str, new_name: &str) -> Result<(), ManagerError>;

    /// Renames the pane at `index` in `session`.
    ///
    /// # Errors
    ///
    /// Fails when the session or pane is unknown.
    fn rename_pane(&self, session: &str, index: &str, title: &str) -> Result<(), ManagerError>;

    /// Splits a pane, returning the new pane's index.
    ///
    /// # Errors
    ///
    /// Fails when the session or pane is unknown.
    fn split_pane(
        &self,
        session: &str,
        index: &str,
        vertical: bool,
        percent: u8,
    ) -> Result<String, ManagerError>;

    /// Closes a pane.
    ///
    /// # Errors
    ///
    /// Fails when the session or pane is unknown.
    fn close_pane(&self, session: &str, index: &str) -> Result<(), ManagerError>;

    /// Swaps two panes within a session.
    ///
    /// # Errors
    ///
    /// Fails when the session or either pane is unknown.
    fn swap_panes(&self, session: &str, first: &str, second: &str) -> Result<(), ManagerError>;

    /// Writes raw input to a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn send_input(&self, pane_id: &str, input: &[u8]) -> Result<(), ManagerError>;

    /// Forwards a mouse event to a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn send_mouse(&self, pane_id: &str, event: &MouseEventPayload) -> Result<(), ManagerError>;

    /// Render surface of a pane, if it exists.
    fn window(&self, pane_id: &str) -> Option<Arc<dyn PaneWindow>>;

    /// Runs a scrollback or copy-mode action.
    ///
    /// # Errors
    ///
    /// Fails for unknown panes or actions.
    fn terminal_action(
        &self,
        request: &TerminalActionRequest,
    ) -> Result<TerminalActionResponse, ManagerError>;

    /// Interprets a key press in scrollback or copy mode.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn handle_key(&self, request: &TerminalKeyRequest)
    -> Result<TerminalKeyResponse, ManagerError>;

    /// Most recent `limit` buffered output lines.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn output_snapshot(&self, pane_id: &str, limit: usize)
    -> Result<Vec<OutputLine>, ManagerError>;

    /// Buffered output lines newer than `since_seq`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn output_since(&self, pane_id: &str, since_seq: u64) -> Result<OutputSince, ManagerError>;

    /// Blocks until the pane produces output or `context` finishes. Returns
    /// `true` when output arrived.
    fn wait_for_output(&self, context: &Context, pane_id: &str) -> bool;

    /// The last `rows` rows of scrollback as text.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn scrollback_snapshot(
        &self,
        pane_id: &str,
        rows: usize,
    ) -> Result<ScrollbackSnapshot, ManagerError>;

    /// Adds tags to a pane, returning the resulting tag set.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn add_tags(&self, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ManagerError>;

    /// Removes tags from a pane, returning the resulting tag set.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn remove_tags(&self, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ManagerError>;

    /// Tags of a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    fn tags(&self, pane_id: &str) -> Result<Vec<String>, ManagerError>;

    /// Sends a named signal to the pane's process.
    ///
    /// # Errors
    ///
    /// Fails for unknown panes or signal names.
    fn signal_pane(&self, pane_id: &str, signal: &str) -> Result<(), ManagerError>;

    /// Hands out the upstream change stream. Only the first caller receives
    /// it; the stream ends when the manager closes.
    fn take_events(&self) -> Option<Receiver<ManagerEvent>>;

    /// Shuts the engine down and ends the change stream.
    fn close(&self);
}
