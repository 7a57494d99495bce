//! In-process session engine backing the daemon binary and the tests.
//!
//! Panes are echo terminals: input written to a pane is appended to its
//! output history and window as text, which is enough to exercise every
//! protocol path without a PTY.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use peaky_protocol::Context;
use peaky_protocol::payloads::{
    MouseAction, MouseEventPayload, OutputLine, PaneSnapshot, SessionSnapshot,
    StartSessionRequest, StartSessionResponse, TerminalAction, TerminalActionRequest,
    TerminalActionResponse, TerminalKeyRequest, TerminalKeyResponse, ToastLevel,
};

use super::{
    ManagerError, ManagerEvent, MemoryWindow, OutputSince, PaneWindow, ScrollbackSnapshot,
    SessionManager,
};
use crate::eventlog::now_unix_ms;

/// Output lines retained per pane.
pub const OUTPUT_LINES: usize = 1000;
/// Grid size of a freshly created pane.
pub const DEFAULT_PANE_SIZE: (u16, u16) = (80, 24);

const DEFAULT_LAYOUT: &str = "default";
const WAIT_SLICE: Duration = Duration::from_millis(50);
const SIGNALS: &[&str] = &[
    "HUP", "INT", "QUIT", "KILL", "USR1", "USR2", "TERM", "CONT", "STOP", "TSTP", "WINCH",
];

struct Pane {
    index: String,
    title: String,
    tags: BTreeSet<String>,
    output: VecDeque<OutputLine>,
    next_seq: u64,
    window: Arc<MemoryWindow>,
}

impl Pane {
    fn new(index: String, title: String) -> Self {
        let (cols, rows) = DEFAULT_PANE_SIZE;
        Self {
            index,
            title,
            tags: BTreeSet::new(),
            output: VecDeque::new(),
            next_seq: 0,
            window: Arc::new(MemoryWindow::new(cols, rows)),
        }
    }

    fn last_seq(&self) -> u64 {
        self.output.back().map_or(0, |line| line.seq)
    }

    fn push_line(&mut self, text: &str, at_unix_ms: i64) {
        self.next_seq += 1;
        self.output.push_back(OutputLine {
            seq: self.next_seq,
            text: text.to_owned(),
            at_unix_ms,
        });
        while self.output.len() > OUTPUT_LINES {
            self.output.pop_front();
        }
    }
}

struct Session {
    name: String,
    path: String,
    layout_name: String,
    panes: Vec<String>,
    active_pane: Option<String>,
}

#[derive(Default)]
struct State {
    sessions: Vec<Session>,
    panes: HashMap<String, Pane>,
    next_pane: u64,
    version: u64,
    closed: bool,
}

impl State {
    fn session(&self, name: &str) -> Result<&Session, ManagerError> {
        self.sessions
            .iter()
            .find(|session| session.name == name)
            .ok_or_else(|| ManagerError::session_not_found(name))
    }

    fn session_mut(&mut self, name: &str) -> Result<&mut Session, ManagerError> {
        self.sessions
            .iter_mut()
            .find(|session| session.name == name)
            .ok_or_else(|| ManagerError::session_not_found(name))
    }

    fn pane(&self, pane_id: &str) -> Result<&Pane, ManagerError> {
        self.panes
            .get(pane_id)
            .ok_or_else(|| ManagerError::pane_not_found(pane_id))
    }

    fn pane_mut(&mut self, pane_id: &str) -> Result<&mut Pane, ManagerError> {
        self.panes
            .get_mut(pane_id)
            .ok_or_else(|| ManagerError::pane_not_found(pane_id))
    }

    fn pane_id_at(&self, session: &str, index: &str) -> Result<String, ManagerError> {
        let index = index.trim();
        self.session(session)?
            .panes
            .iter()
            .find(|id| self.panes.get(*id).is_some_and(|pane| pane.index == index))
            .cloned()
            .ok_or_else(|| ManagerError::PaneIndexNotFound {
                session: session.to_owned(),
                index: index.to_owned(),
            })
    }

    fn create_pane(&mut self, index: String, title: String) -> String {
        self.next_pane += 1;
        let id = format!("p-{}", self.next_pane);
        self.panes.insert(id.clone(), Pane::new(index, title));
        id
    }

    fn ensure_open(&self) -> Result<(), ManagerError> {
        if self.closed {
            Err(ManagerError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Reference [`SessionManager`] keeping every session in memory.
pub struct MemoryManager {
    state: Mutex<State>,
    output_ready: Condvar,
    events: Mutex<Option<Sender<ManagerEvent>>>,
    receiver: Mutex<Option<Receiver<ManagerEvent>>>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    /// Creates an engine with no sessions.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            state: Mutex::new(State::default()),
            output_ready: Condvar::new(),
            events: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ManagerEvent) {
        let sender = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            // The receiver may already be gone during shutdown.
            sender.send(event).ok();
        }
    }

    fn memory_window(&self, pane_id: &str) -> Result<Arc<MemoryWindow>, ManagerError> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(Arc::clone(&state.pane(pane_id)?.window))
    }

    /// Appends `text` to a pane as if its process had printed it.
    ///
    /// Returns the pane's new content sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PaneNotFound`] for an unknown pane.
    pub fn write_output(&self, pane_id: &str, text: &str) -> Result<u64, ManagerError> {
        let window = {
            let mut state = self.lock();
            state.ensure_open()?;
            let pane = state.pane_mut(pane_id)?;
            let now = now_unix_ms();
            for line in text.split('\n').filter(|line| !line.is_empty()) {
                pane.push_line(line.trim_end_matches('\r'), now);
            }
            Arc::clone(&pane.window)
        };
        let seq = window.write(text.trim_end_matches('\n'));
        self.output_ready.notify_all();
        self.emit(ManagerEvent::Updated {
            pane_id: pane_id.to_owned(),
            seq,
        });
        Ok(seq)
    }

    /// Concrete window of a pane, for driving pointer and scrollback state
    /// directly.
    #[must_use]
    pub fn memory_window_of(&self, pane_id: &str) -> Option<Arc<MemoryWindow>> {
        self.memory_window(pane_id).ok()
    }

    /// Raises a toast for a pane through the change stream.
    pub fn notify(&self, pane_id: &str, text: &str) {
        self.emit(ManagerEvent::Toast {
            pane_id: pane_id.to_owned(),
            text: text.to_owned(),
        });
    }

    fn meta_changed(&self, pane_id: &str) {
        self.emit(ManagerEvent::MetaUpdated {
            pane_id: pane_id.to_owned(),
        });
    }
}

impl SessionManager for MemoryManager {
    fn session_names(&self) -> Vec<String> {
        self.lock()
            .sessions
            .iter()
            .map(|session| session.name.clone())
            .collect()
    }

    fn snapshot(&self, preview_lines: usize) -> Vec<SessionSnapshot> {
        let state = self.lock();
        state
            .sessions
            .iter()
            .map(|session| SessionSnapshot {
                name: session.name.clone(),
                path: session.path.clone(),
                layout_name: session.layout_name.clone(),
                panes: session
                    .panes
                    .iter()
                    .filter_map(|id| state.panes.get(id).map(|pane| (id, pane)))
                    .map(|(id, pane)| {
                        let skip = pane.output.len().saturating_sub(preview_lines);
                        PaneSnapshot {
                            id: id.clone(),
                            index: pane.index.clone(),
                            title: pane.title.clone(),
                            active: session.active_pane.as_ref() == Some(id),
                            tags: pane.tags.iter().cloned().collect(),
                            preview: pane
                                .output
                                .iter()
                                .skip(skip)
                                .map(|line| line.text.clone())
                                .collect(),
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    fn version(&self) -> u64 {
        self.lock().version
    }

    fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionResponse, ManagerError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ManagerError::invalid_argument("session name is required"));
        }
        let mut state = self.lock();
        state.ensure_open()?;
        if state.session(name).is_ok() {
            return Err(ManagerError::SessionExists {
                name: name.to_owned(),
            });
        }
        let layout_name = if request.layout_name.trim().is_empty() {
            DEFAULT_LAYOUT.to_owned()
        } else {
            request.layout_name.trim().to_owned()
        };
        let pane_id = state.create_pane("0".to_owned(), name.to_owned());
        state.sessions.push(Session {
            name: name.to_owned(),
            path: request.path.clone(),
            layout_name: layout_name.clone(),
            panes: vec![pane_id.clone()],
            active_pane: Some(pane_id),
        });
        state.version += 1;
        Ok(StartSessionResponse {
            name: name.to_owned(),
            path: request.path.clone(),
            layout_name,
        })
    }

    fn kill_session(&self, name: &str) -> Result<(), ManagerError> {
        let mut state = self.lock();
        state.ensure_open()?;
        let position = state
            .sessions
            .iter()
            .position(|session| session.name == name)
            .ok_or_else(|| ManagerError::session_not_found(name))?;
        let session = state.sessions.remove(position);
        for pane_id in &session.panes {
            state.panes.remove(pane_id);
        }
        state.version += 1;
        Ok(())
    }

    fn rename_session(&self, old_name: &str, new_name: &str) -> Result<(), ManagerError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(ManagerError::invalid_argument("new session name is required"));
        }
        let mut state = self.lock();
        state.ensure_open()?;
        if old_name != new_name && state.session(new_name).is_ok() {
            return Err(ManagerError::SessionExists {
                name: new_name.to_owned(),
            });
        }
        state.session_mut(old_name)?.name = new_name.to_owned();
        state.version += 1;
        Ok(())
    }

    fn rename_pane(&self, session: &str, index: &str, title: &str) -> Result<(), ManagerError> {
        let pane_id = {
            let mut state = self.lock();
            state.ensure_open()?;
            let pane_id = state.pane_id_at(session, index)?;
            state.pane_mut(&pane_id)?.title = title.to_owned();
            pane_id
        };
        self.meta_changed(&pane_id);
        Ok(())
    }

    fn split_pane(
        &self,
        session: &str,
        index: &str,
        _vertical: bool,
        percent: u8,
    ) -> Result<String, ManagerError> {
        if percent > 100 {
            return Err(ManagerError::invalid_argument(format!(
                "split percent {percent} out of range"
            )));
        }
        let mut state = self.lock();
        state.ensure_open()?;
        let source = state.pane_id_at(session, index)?;
        let next_index = state
            .session(session)?
            .panes
            .iter()
            .filter_map(|id| state.panes.get(id))
            .filter_map(|pane| pane.index.parse::<u32>().ok())
            .max()
            .map_or(0, |max| max + 1)
            .to_string();
        let title = state.pane(&source)?.title.clone();
        let pane_id = state.create_pane(next_index.clone(), title);
        let target = state.session_mut(session)?;
        let position = target
            .panes
            .iter()
            .position(|id| *id == source)
            .map_or(target.panes.len(), |position| position + 1);
        target.panes.insert(position, pane_id.clone());
        target.active_pane = Some(pane_id);
        state.version += 1;
        Ok(next_index)
    }

    fn close_pane(&self, session: &str, index: &str) -> Result<(), ManagerError> {
        let mut state = self.lock();
        state.ensure_open()?;
        let pane_id = state.pane_id_at(session, index)?;
        state.panes.remove(&pane_id);
        let target = state.session_mut(session)?;
        target.panes.retain(|id| *id != pane_id);
        if target.active_pane.as_ref() == Some(&pane_id) {
            target.active_pane = target.panes.first().cloned();
        }
        state.version += 1;
        Ok(())
    }

    fn swap_panes(&self, session: &str, first: &str, second: &str) -> Result<(), ManagerError> {
        let mut state = self.lock();
        state.ensure_open()?;
        let first_id = state.pane_id_at(session, first)?;
        let second_id = state.pane_id_at(session, second)?;
        let target = state.session_mut(session)?;
        let first_pos = target.panes.iter().position(|id| *id == first_id);
        let second_pos = target.panes.iter().position(|id| *id == second_id);
        if let (Some(a), Some(b)) = (first_pos, second_pos) {
            target.panes.swap(a, b);
        }
        state.version += 1;
        Ok(())
    }

    fn send_input(&self, pane_id: &str, input: &[u8]) -> Result<(), ManagerError> {
        if input.is_empty() {
            self.memory_window(pane_id)?;
            return Ok(());
        }
        let text = String::from_utf8_lossy(input);
        self.write_output(pane_id, &text).map(|_| ())
    }

    fn send_mouse(&self, pane_id: &str, event: &MouseEventPayload) -> Result<(), ManagerError> {
        let window = self.memory_window(pane_id)?;
        if event.action == MouseAction::Unknown {
            return Err(ManagerError::invalid_argument("unknown mouse action"));
        }
        if event.wheel && !window.has_pointer_mode() {
            if event.button == 4 {
                window.scroll_up(3);
            } else {
                window.scroll_down(3);
            }
        }
        Ok(())
    }

    fn window(&self, pane_id: &str) -> Option<Arc<dyn PaneWindow>> {
        self.memory_window(pane_id)
            .ok()
            .map(|window| window as Arc<dyn PaneWindow>)
    }

    fn terminal_action(
        &self,
        request: &TerminalActionRequest,
    ) -> Result<TerminalActionResponse, ManagerError> {
        let window = self.memory_window(&request.pane_id)?;
        let mut response = TerminalActionResponse {
            pane_id: request.pane_id.clone(),
            text: String::new(),
        };
        match request.action {
            TerminalAction::Unknown => {
                return Err(ManagerError::invalid_argument("unknown terminal action"));
            }
            TerminalAction::EnterScrollback => window.enter_scrollback(),
            TerminalAction::ExitScrollback => window.exit_scrollback(),
            TerminalAction::ScrollUp => window.scroll_up(request.lines),
            TerminalAction::ScrollDown => window.scroll_down(request.lines),
            TerminalAction::PageUp => window.page_up(),
            TerminalAction::PageDown => window.page_down(),
            TerminalAction::ScrollTop => window.scroll_to_top(),
            TerminalAction::ScrollBottom => window.scroll_to_bottom(),
            TerminalAction::EnterCopyMode => window.enter_copy_mode(),
            TerminalAction::ExitCopyMode => window.exit_copy_mode(),
            TerminalAction::CopyMove => window.copy_move(request.delta_x, request.delta_y),
            TerminalAction::CopyPageUp => window.copy_page_up(),
            TerminalAction::CopyPageDown => window.copy_page_down(),
            TerminalAction::CopyToggleSelect => window.copy_toggle_select(),
            TerminalAction::CopyYank => response.text = window.copy_yank_text(),
        }
        Ok(response)
    }

    fn handle_key(
        &self,
        request: &TerminalKeyRequest,
    ) -> Result<TerminalKeyResponse, ManagerError> {
        let window = self.memory_window(&request.pane_id)?;
        if window.copy_mode_active() {
            return Ok(copy_mode_key(&window, &request.key));
        }
        if window.scrollback_active() {
            return Ok(scrollback_key(&window, request));
        }
        Ok(normal_key(&window, request))
    }

    fn output_snapshot(
        &self,
        pane_id: &str,
        limit: usize,
    ) -> Result<Vec<OutputLine>, ManagerError> {
        let state = self.lock();
        let pane = state.pane(pane_id)?;
        let skip = if limit == 0 {
            0
        } else {
            pane.output.len().saturating_sub(limit)
        };
        Ok(pane.output.iter().skip(skip).cloned().collect())
    }

    fn output_since(&self, pane_id: &str, since_seq: u64) -> Result<OutputSince, ManagerError> {
        let state = self.lock();
        let pane = state.pane(pane_id)?;
        let oldest = pane.output.front().map_or(0, |line| line.seq);
        let lines: Vec<OutputLine> = pane
            .output
            .iter()
            .filter(|line| line.seq > since_seq)
            .cloned()
            .collect();
        Ok(OutputSince {
            next_seq: lines.last().map_or(since_seq.max(pane.last_seq()), |line| line.seq),
            truncated: oldest > since_seq.saturating_add(1),
            lines,
        })
    }

    fn wait_for_output(&self, context: &Context, pane_id: &str) -> bool {
        let mut state = self.lock();
        let Ok(start) = state.pane(pane_id).map(Pane::last_seq) else {
            return false;
        };
        loop {
            if state.closed || context.is_done() {
                return false;
            }
            match state.pane(pane_id) {
                Ok(pane) if pane.last_seq() != start => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
            let slice = context
                .remaining()
                .map_or(WAIT_SLICE, |remaining| remaining.min(WAIT_SLICE));
            state = self
                .output_ready
                .wait_timeout(state, slice)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    fn scrollback_snapshot(
        &self,
        pane_id: &str,
        rows: usize,
    ) -> Result<ScrollbackSnapshot, ManagerError> {
        let window = self.memory_window(pane_id)?;
        let (content, truncated) = window.tail(rows);
        Ok(ScrollbackSnapshot { content, truncated })
    }

    fn add_tags(&self, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ManagerError> {
        let result = {
            let mut state = self.lock();
            let pane = state.pane_mut(pane_id)?;
            for tag in tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()) {
                pane.tags.insert(tag.to_owned());
            }
            pane.tags.iter().cloned().collect()
        };
        self.meta_changed(pane_id);
        Ok(result)
    }

    fn remove_tags(&self, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ManagerError> {
        let result = {
            let mut state = self.lock();
            let pane = state.pane_mut(pane_id)?;
            for tag in tags {
                pane.tags.remove(tag.trim());
            }
            pane.tags.iter().cloned().collect()
        };
        self.meta_changed(pane_id);
        Ok(result)
    }

    fn tags(&self, pane_id: &str) -> Result<Vec<String>, ManagerError> {
        let state = self.lock();
        Ok(state.pane(pane_id)?.tags.iter().cloned().collect())
    }

    fn signal_pane(&self, pane_id: &str, signal: &str) -> Result<(), ManagerError> {
        self.memory_window(pane_id)?;
        let upper = signal.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        if SIGNALS.contains(&name) {
            Ok(())
        } else {
            Err(ManagerError::invalid_argument(format!(
                "unknown signal \"{signal}\""
            )))
        }
    }

    fn take_events(&self) -> Option<Receiver<ManagerEvent>> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn close(&self) {
        self.lock().closed = true;
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.output_ready.notify_all();
    }
}

fn toast(text: &str, level: ToastLevel) -> TerminalKeyResponse {
    TerminalKeyResponse {
        handled: true,
        toast: text.to_owned(),
        toast_level: level,
        yank_text: String::new(),
    }
}

const fn handled() -> TerminalKeyResponse {
    TerminalKeyResponse {
        handled: true,
        toast: String::new(),
        toast_level: ToastLevel::Info,
        yank_text: String::new(),
    }
}

const COPY_HELP: &str = "Copy mode: hjkl/arrows | v select | y yank | esc/q exit";
const SCROLLBACK_HELP: &str = "Scrollback: up/down/pgup/pgdown | Copy (f8) | Exit (esc/q)";

fn yank(window: &MemoryWindow) -> TerminalKeyResponse {
    let text = window.copy_yank_text();
    window.exit_copy_mode();
    if text.is_empty() {
        return toast("Nothing to yank", ToastLevel::Warning);
    }
    TerminalKeyResponse {
        yank_text: text,
        ..toast("Yanked to clipboard", ToastLevel::Success)
    }
}

fn copy_mode_key(window: &MemoryWindow, key: &str) -> TerminalKeyResponse {
    match key {
        "esc" | "q" => {
            window.exit_copy_mode();
            toast("Copy mode exited", ToastLevel::Info)
        }
        "up" | "k" => {
            window.copy_move(0, -1);
            handled()
        }
        "down" | "j" => {
            window.copy_move(0, 1);
            handled()
        }
        "left" | "h" => {
            window.copy_move(-1, 0);
            handled()
        }
        "right" | "l" => {
            window.copy_move(1, 0);
            handled()
        }
        "pgup" => {
            window.copy_page_up();
            handled()
        }
        "pgdown" => {
            window.copy_page_down();
            handled()
        }
        "v" => {
            window.copy_toggle_select();
            toast(
                "Selection toggled (v) | Yank (y) | Exit (esc/q)",
                ToastLevel::Info,
            )
        }
        "y" | "ctrl+c" => yank(window),
        _ => handled(),
    }
}

fn scrollback_key(window: &MemoryWindow, request: &TerminalKeyRequest) -> TerminalKeyResponse {
    if request.copy_toggle {
        window.enter_copy_mode();
        return toast(COPY_HELP, ToastLevel::Info);
    }
    if request.scrollback_toggle {
        window.page_up();
        return handled();
    }
    match request.key.as_str() {
        "esc" | "q" => {
            window.exit_scrollback();
            toast("Scrollback exited", ToastLevel::Info)
        }
        "up" | "k" => {
            window.scroll_up(1);
            handled()
        }
        "down" | "j" => {
            window.scroll_down(1);
            handled()
        }
        "pgup" => {
            window.page_up();
            handled()
        }
        "pgdown" => {
            window.page_down();
            handled()
        }
        "home" | "g" => {
            window.scroll_to_top();
            handled()
        }
        "end" | "G" => {
            window.scroll_to_bottom();
            handled()
        }
        _ => handled(),
    }
}

fn normal_key(window: &MemoryWindow, request: &TerminalKeyRequest) -> TerminalKeyResponse {
    if request.scrollback_toggle {
        window.enter_scrollback();
        window.page_up();
        return toast(SCROLLBACK_HELP, ToastLevel::Info);
    }
    if request.copy_toggle {
        window.enter_copy_mode();
        return toast(COPY_HELP, ToastLevel::Info);
    }
    TerminalKeyResponse::default()
}
