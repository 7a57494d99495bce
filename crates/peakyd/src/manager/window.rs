//! In-memory pane window: a line buffer with scrollback and copy mode.
//!
//! The window stands in for a terminal emulator. Output is appended as
//! plain text lines and rendering crops or pads the visible lines to the
//! requested grid. Every change that alters what a render would show bumps
//! the update sequence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use peaky_protocol::Context;
use peaky_protocol::payloads::{ColorProfile, Cursor, Frame, PaneViewMode};

use super::{ManagerError, PaneWindow, RenderError, RenderOptions};

/// Lines retained per window.
pub const SCROLLBACK_LINES: usize = 2000;

const REVERSE_VIDEO: &str = "\x1b[7m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CopyCursor {
    col: usize,
    line: usize,
}

#[derive(Debug, Default)]
struct WindowState {
    cols: u16,
    rows: u16,
    lines: VecDeque<String>,
    scroll_offset: usize,
    scrollback: bool,
    copy: Option<CopyCursor>,
    selection_anchor: Option<usize>,
    cached: Option<(u64, RenderOptions, Frame)>,
}

impl WindowState {
    fn page(&self) -> usize {
        usize::from(self.rows.max(1))
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.page())
    }

    fn last_line(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    /// Index of the first visible line and the number of visible lines.
    fn viewport(&self, rows: usize) -> (usize, usize) {
        let end = self.lines.len().saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(rows);
        (start, end - start)
    }
}

/// Reference [`PaneWindow`] backed by a bounded line buffer.
#[derive(Debug)]
pub struct MemoryWindow {
    state: Mutex<WindowState>,
    update_seq: AtomicU64,
    pointer_mode: AtomicBool,
    pointer_motion: AtomicBool,
}

impl MemoryWindow {
    /// Creates an empty window of the given size.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            state: Mutex::new(WindowState {
                cols: cols.max(1),
                rows: rows.max(1),
                ..WindowState::default()
            }),
            update_seq: AtomicU64::new(0),
            pointer_mode: AtomicBool::new(false),
            pointer_motion: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) -> u64 {
        self.update_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Appends output text, one line per newline-separated segment, and
    /// returns the new update sequence.
    pub fn write(&self, text: &str) -> u64 {
        {
            let mut state = self.lock();
            for line in text.split('\n') {
                state.lines.push_back(line.trim_end_matches('\r').to_owned());
                while state.lines.len() > SCROLLBACK_LINES {
                    state.lines.pop_front();
                }
            }
            if state.scroll_offset > 0 {
                let offset = state.scroll_offset;
                state.scroll_offset = offset.min(state.max_offset());
            }
        }
        self.bump()
    }

    /// Toggles mouse reporting as an application inside the pane would.
    pub fn set_pointer_mode(&self, enabled: bool, motion: bool) {
        self.pointer_mode.store(enabled, Ordering::SeqCst);
        self.pointer_motion.store(enabled && motion, Ordering::SeqCst);
    }

    /// Current grid size.
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        let state = self.lock();
        (state.cols, state.rows)
    }

    /// The last `rows` buffered lines joined with newlines, and whether
    /// older lines were left out.
    #[must_use]
    pub fn tail(&self, rows: usize) -> (String, bool) {
        let state = self.lock();
        let skip = state.lines.len().saturating_sub(rows);
        let content = state
            .lines
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        (content, skip > 0)
    }

    /// Whether scrollback mode is active or the view is scrolled.
    #[must_use]
    pub fn scrollback_active(&self) -> bool {
        let state = self.lock();
        state.scrollback || state.scroll_offset > 0
    }

    /// Whether copy mode is active.
    #[must_use]
    pub fn copy_mode_active(&self) -> bool {
        self.lock().copy.is_some()
    }

    /// Lines scrolled back from live output.
    #[must_use]
    pub fn scroll_offset(&self) -> usize {
        self.lock().scroll_offset
    }

    fn mutate(&self, change: impl FnOnce(&mut WindowState)) {
        change(&mut self.lock());
        self.bump();
    }

    /// Enters scrollback mode.
    pub fn enter_scrollback(&self) {
        self.mutate(|state| state.scrollback = true);
    }

    /// Leaves scrollback (and copy) mode and returns to live output.
    pub fn exit_scrollback(&self) {
        self.mutate(|state| {
            state.scrollback = false;
            state.scroll_offset = 0;
            state.copy = None;
            state.selection_anchor = None;
        });
    }

    /// Scrolls towards older output; zero counts as one line.
    pub fn scroll_up(&self, lines: usize) {
        self.mutate(|state| {
            state.scrollback = true;
            let target = state.scroll_offset.saturating_add(lines.max(1));
            state.scroll_offset = target.min(state.max_offset());
        });
    }

    /// Scrolls towards live output; zero counts as one line.
    pub fn scroll_down(&self, lines: usize) {
        self.mutate(|state| {
            state.scroll_offset = state.scroll_offset.saturating_sub(lines.max(1));
        });
    }

    /// Scrolls up one page.
    pub fn page_up(&self) {
        let page = self.lock().page();
        self.scroll_up(page);
    }

    /// Scrolls down one page.
    pub fn page_down(&self) {
        let page = self.lock().page();
        self.scroll_down(page);
    }

    /// Jumps to the oldest retained line.
    pub fn scroll_to_top(&self) {
        self.mutate(|state| {
            state.scrollback = true;
            state.scroll_offset = state.max_offset();
        });
    }

    /// Jumps back to live output, staying in scrollback mode.
    pub fn scroll_to_bottom(&self) {
        self.mutate(|state| state.scroll_offset = 0);
    }

    /// Enters copy mode with the cursor on the last visible line.
    pub fn enter_copy_mode(&self) {
        self.mutate(|state| {
            let rows = state.page();
            let (start, visible) = state.viewport(rows);
            let line = (start + visible).saturating_sub(1);
            state.copy = Some(CopyCursor { col: 0, line });
            state.selection_anchor = None;
        });
    }

    /// Leaves copy mode.
    pub fn exit_copy_mode(&self) {
        self.mutate(|state| {
            state.copy = None;
            state.selection_anchor = None;
        });
    }

    /// Moves the copy cursor, clamped to the buffer.
    pub fn copy_move(&self, delta_x: i32, delta_y: i32) {
        self.mutate(|state| {
            let last = state.last_line();
            let width = usize::from(state.cols).saturating_sub(1);
            if let Some(cursor) = state.copy.as_mut() {
                cursor.col = offset(cursor.col, delta_x).min(width);
                cursor.line = offset(cursor.line, delta_y).min(last);
            }
        });
    }

    /// Moves the copy cursor up one page.
    pub fn copy_page_up(&self) {
        let page = self.lock().page();
        self.copy_move(0, -i32::try_from(page).unwrap_or(i32::MAX));
    }

    /// Moves the copy cursor down one page.
    pub fn copy_page_down(&self) {
        let page = self.lock().page();
        self.copy_move(0, i32::try_from(page).unwrap_or(i32::MAX));
    }

    /// Starts a selection at the copy cursor, or clears the current one.
    pub fn copy_toggle_select(&self) {
        self.mutate(|state| {
            state.selection_anchor = match (state.selection_anchor, state.copy) {
                (None, Some(cursor)) => Some(cursor.line),
                _ => None,
            };
        });
    }

    /// Text of the selected lines, or of the cursor line without a selection.
    #[must_use]
    pub fn copy_yank_text(&self) -> String {
        let state = self.lock();
        let Some(cursor) = state.copy else {
            return String::new();
        };
        let anchor = state.selection_anchor.unwrap_or(cursor.line);
        let (first, last) = if anchor <= cursor.line {
            (anchor, cursor.line)
        } else {
            (cursor.line, anchor)
        };
        state
            .lines
            .iter()
            .skip(first)
            .take(last - first + 1)
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(&self, options: &RenderOptions) -> Frame {
        let state = self.lock();
        let cols = usize::from(options.cols.max(1));
        let rows = usize::from(options.rows.max(1));
        let (start, visible) = state.viewport(rows);
        let highlight = options.mode == PaneViewMode::Styled
            && options.color_profile != ColorProfile::Ascii;
        let selected = selection_range(&state);

        let mut lines = Vec::with_capacity(rows);
        for (index, line) in state.lines.iter().enumerate().skip(start).take(visible) {
            let cell = fit(line, cols);
            let marked = selected.is_some_and(|(first, last)| (first..=last).contains(&index));
            if highlight && marked {
                lines.push(format!("{REVERSE_VIDEO}{cell}{RESET}"));
            } else {
                lines.push(cell);
            }
        }
        while lines.len() < rows {
            lines.push(" ".repeat(cols));
        }

        let (col, row) = match state.copy {
            Some(cursor) => (cursor.col, cursor.line.saturating_sub(start)),
            None => {
                let last = state
                    .lines
                    .get((start + visible).saturating_sub(1))
                    .map_or(0, |line| line.chars().count());
                (last, visible.saturating_sub(1))
            }
        };
        let live = state.scroll_offset == 0 || state.copy.is_some();
        Frame {
            lines,
            cursor: Cursor {
                col: clamp_u16(col.min(cols - 1)),
                row: clamp_u16(row.min(rows - 1)),
                visible: options.show_cursor && live,
            },
        }
    }
}

impl PaneWindow for MemoryWindow {
    fn resize(&self, cols: u16, rows: u16) -> Result<(), ManagerError> {
        if cols == 0 || rows == 0 {
            return Err(ManagerError::invalid_argument(format!(
                "invalid pane size {cols}x{rows}"
            )));
        }
        let changed = {
            let mut state = self.lock();
            let changed = state.cols != cols || state.rows != rows;
            state.cols = cols;
            state.rows = rows;
            let max = state.max_offset();
            state.scroll_offset = state.scroll_offset.min(max);
            changed
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn update_seq(&self) -> u64 {
        self.update_seq.load(Ordering::SeqCst)
    }

    fn render_cached(
        &self,
        context: &Context,
        options: &RenderOptions,
    ) -> Result<Frame, RenderError> {
        context.check()?;
        let seq = self.update_seq();
        if let Some((cached_seq, cached_options, frame)) = self.lock().cached.as_ref()
            && *cached_seq == seq
            && cached_options == options
        {
            return Ok(frame.clone());
        }
        let frame = self.render(options);
        context.check()?;
        self.lock().cached = Some((seq, *options, frame.clone()));
        Ok(frame)
    }

    fn render_direct(
        &self,
        context: &Context,
        options: &RenderOptions,
    ) -> Result<Frame, RenderError> {
        context.check()?;
        let frame = self.render(options);
        context.check()?;
        Ok(frame)
    }

    fn has_pointer_mode(&self) -> bool {
        self.pointer_mode.load(Ordering::SeqCst)
    }

    fn allows_pointer_motion(&self) -> bool {
        self.pointer_motion.load(Ordering::SeqCst)
    }
}

fn selection_range(state: &WindowState) -> Option<(usize, usize)> {
    let cursor = state.copy?;
    let anchor = state.selection_anchor?;
    Some((anchor.min(cursor.line), anchor.max(cursor.line)))
}

fn offset(value: usize, delta: i32) -> usize {
    let magnitude = usize::try_from(delta.unsigned_abs()).unwrap_or(usize::MAX);
    if delta < 0 {
        value.saturating_sub(magnitude)
    } else {
        value.saturating_add(magnitude)
    }
}

fn fit(line: &str, cols: usize) -> String {
    let mut cell: String = line.chars().take(cols).collect();
    let width = cell.chars().count();
    cell.extend(std::iter::repeat_n(' ', cols - width));
    cell
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
