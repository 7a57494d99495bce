//! Pane-view render requests and rendered frames.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the daemon renders a pane grid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaneViewMode {
    /// Lines carry raw ANSI escape sequences.
    #[default]
    Ansi,
    /// Lines are pre-styled for the caller's colour profile.
    Styled,
}

/// Colour capability of the caller's terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColorProfile {
    /// No colour at all.
    Ascii,
    /// Sixteen-colour ANSI.
    Ansi,
    /// 256-colour palette.
    Ansi256,
    /// 24-bit colour.
    #[default]
    TrueColor,
}

/// Scheduling priority declared by the caller.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaneViewPriority {
    /// No priority supplied; scheduled as [`PaneViewPriority::Normal`].
    #[default]
    Unset,
    /// Pane visible but not interesting.
    Background,
    /// Ordinary visible pane.
    Normal,
    /// Pane holding the caller's focus.
    Focused,
}

impl PaneViewPriority {
    /// Numeric scheduling level: background 1, normal (or unset) 2, focused 3.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Background => 1,
            Self::Unset | Self::Normal => 2,
            Self::Focused => 3,
        }
    }

    /// Highest scheduling level a job can reach through ageing.
    pub const MAX_LEVEL: u8 = 3;
}

/// Request to render a pane as a character grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneViewRequest {
    /// Target pane.
    pub pane_id: String,
    /// Requested width in cells.
    pub cols: u16,
    /// Requested height in cells.
    pub rows: u16,
    /// Render mode.
    pub mode: PaneViewMode,
    /// Draw the cursor in the rendered output.
    pub show_cursor: bool,
    /// Caller colour capability.
    pub color_profile: ColorProfile,
    /// Absolute caller deadline in unix nanoseconds; zero means none.
    pub deadline_unix_nano: i64,
    /// Content sequence the caller already holds; zero means none.
    pub known_seq: u64,
    /// Declared scheduling priority.
    pub priority: PaneViewPriority,
    /// Bypass the window's render cache.
    pub direct_render: bool,
}

/// Cursor placement within a rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cursor {
    /// Zero-based column.
    pub col: u16,
    /// Zero-based row.
    pub row: u16,
    /// Whether the cursor is drawn.
    pub visible: bool,
}

/// Rendered grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frame {
    /// One entry per grid row.
    pub lines: Vec<String>,
    /// Cursor state at render time.
    pub cursor: Cursor,
}

/// Result of a pane-view request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneViewResponse {
    /// Rendered pane.
    pub pane_id: String,
    /// Rendered width after normalisation.
    pub cols: u16,
    /// Rendered height after normalisation.
    pub rows: u16,
    /// Render mode used.
    pub mode: PaneViewMode,
    /// Whether the cursor was drawn.
    pub show_cursor: bool,
    /// Colour profile used.
    pub color_profile: ColorProfile,
    /// Pane content sequence this frame reflects.
    pub update_seq: u64,
    /// The caller already holds this content; `frame` is empty.
    pub not_modified: bool,
    /// Rendered grid.
    pub frame: Frame,
    /// The pane's application has enabled mouse reporting.
    pub has_pointer_mode: bool,
    /// The pane's application wants pointer motion events.
    pub allows_pointer_motion: bool,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PaneViewPriority::Unset, 2)]
    #[case(PaneViewPriority::Background, 1)]
    #[case(PaneViewPriority::Normal, 2)]
    #[case(PaneViewPriority::Focused, PaneViewPriority::MAX_LEVEL)]
    fn priority_levels(#[case] priority: PaneViewPriority, #[case] level: u8) {
        assert_eq!(priority.level(), level);
    }

    #[test]
    fn partial_request_fills_defaults() {
        let request: PaneViewRequest =
            serde_json::from_str(r#"{"pane_id":"p-1","cols":80}"#).expect("decode");
        assert_eq!(request.rows, 0);
        assert_eq!(request.priority, PaneViewPriority::Unset);
        assert_eq!(request.color_profile, ColorProfile::TrueColor);
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&ColorProfile::TrueColor).expect("encode");
        assert_eq!(json, r#""true_color""#);
        assert_eq!(PaneViewMode::Styled.to_string(), "styled");
    }
}
