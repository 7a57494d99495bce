//! Payload (de)serialisation at the envelope boundary.
//!
//! Envelope payloads are opaque bytes. The [`PayloadCodec`] trait fixes the
//! contract every codec honours: encoding an absent value yields an empty byte
//! sequence and decoding an empty byte sequence leaves the target at its
//! default. [`JsonCodec`] is the codec used on the wire.

use std::any::type_name;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialised.
    #[error("failed to encode {type_name} payload: {source}")]
    Encode {
        /// Rust type being encoded.
        type_name: &'static str,
        /// Underlying serialiser error.
        #[source]
        source: serde_json::Error,
    },
    /// The bytes could not be decoded into the target type.
    #[error("failed to decode {type_name} payload: {source}")]
    Decode {
        /// Rust type being decoded.
        type_name: &'static str,
        /// Underlying deserialiser error.
        #[source]
        source: serde_json::Error,
    },
}

/// Serialisation strategy for envelope payloads.
pub trait PayloadCodec: Send + Sync {
    /// Encodes `value`. Values that serialise to nothing (unit, `None`)
    /// produce an empty byte sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] when serialisation fails.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decodes `bytes`. An empty slice yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the bytes do not describe a `T`.
    fn decode<T: DeserializeOwned + Default>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON payload codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

const JSON_NULL: &[u8] = b"null";

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_json::to_vec(value).map_err(|source| CodecError::Encode {
            type_name: type_name::<T>(),
            source,
        })?;
        if bytes == JSON_NULL {
            return Ok(Vec::new());
        }
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned + Default>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        if bytes.is_empty() || bytes == JSON_NULL {
            return Ok(T::default());
        }
        serde_json::from_slice(bytes).map_err(|source| CodecError::Decode {
            type_name: type_name::<T>(),
            source,
        })
    }
}

/// Encodes a payload with the wire codec.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when serialisation fails.
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    JsonCodec.encode(value)
}

/// Decodes a payload with the wire codec.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] when the bytes do not describe a `T`.
pub fn decode_payload<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, CodecError> {
    JsonCodec.decode(bytes)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::payloads::{
        ClosePaneRequest, ColorProfile, Cursor, EventsReplayRequest, EventsReplayResponse, Frame,
        HelloRequest, HelloResponse, KillSessionRequest, MouseAction, MouseEventPayload,
        OutputLine, PaneActionEntry, PaneFocusRequest, PaneHistoryRequest, PaneHistoryResponse,
        PaneOutputRequest, PaneOutputResponse, PaneSignalRequest, PaneSnapshot,
        PaneSnapshotRequest, PaneSnapshotResponse, PaneTagListResponse, PaneTagRequest,
        PaneViewMode, PaneViewPriority, PaneViewRequest, PaneViewResponse, PaneWaitRequest,
        PaneWaitResponse, RelayConfig, RelayCreateRequest, RelayCreateResponse, RelayInfo,
        RelayListResponse, RelayMode, RelayStatus, RelayStopRequest, RenamePaneRequest,
        RenameSessionRequest, RenameSessionResponse, ResizePaneRequest, SendInputRequest,
        SendMouseRequest, SessionFocusRequest, SessionNamesResponse, SessionSnapshot,
        SnapshotRequest, SnapshotResponse, SplitPaneRequest, SplitPaneResponse,
        StartSessionRequest, StartSessionResponse, SwapPanesRequest, TerminalAction,
        TerminalActionRequest, TerminalActionResponse, TerminalKeyRequest, TerminalKeyResponse,
        ToastLevel,
    };
    use crate::{Event, EventType};

    #[test]
    fn unit_and_none_encode_to_nothing() {
        assert!(encode_payload(&()).expect("encode unit").is_empty());
        assert!(encode_payload(&None::<u32>).expect("encode none").is_empty());
    }

    #[test]
    fn empty_bytes_decode_to_default() {
        let request: StartSessionRequest = decode_payload(&[]).expect("decode empty");
        assert_eq!(request, StartSessionRequest::default());
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_owned()).collect()
    }

    fn relay() -> RelayInfo {
        RelayInfo {
            id: "r-1".to_owned(),
            from_pane_id: "p-1".to_owned(),
            to_pane_ids: strings(&["p-2", "p-3"]),
            mode: RelayMode::Raw,
            status: RelayStatus::Stopped,
            created_at_unix_ms: 1_700_000_000_000,
        }
    }

    #[rstest]
    #[case::hello(HelloRequest { version: "1.2.0".to_owned(), client_id: "cli-7".to_owned() })]
    #[case::hello_reply(HelloResponse { version: "1.2.0".to_owned(), pid: 4242 })]
    #[case::no_sessions(SessionNamesResponse::default())]
    #[case::session_names(SessionNamesResponse { names: strings(&["alpha", "beta"]) })]
    #[case::snapshot(SnapshotRequest { preview_lines: 3 })]
    #[case::empty_snapshot(SnapshotResponse::default())]
    #[case::snapshot_reply(SnapshotResponse {
        version: 7,
        sessions: vec![SessionSnapshot {
            name: "alpha".to_owned(),
            path: "/work".to_owned(),
            layout_name: "dev".to_owned(),
            panes: vec![PaneSnapshot {
                id: "p-1".to_owned(),
                index: "0".to_owned(),
                title: "shell".to_owned(),
                active: true,
                tags: strings(&["build"]),
                preview: strings(&["$ make", ""]),
            }],
        }],
    })]
    #[case::start(StartSessionRequest {
        name: "alpha".to_owned(),
        path: "/work".to_owned(),
        layout_name: String::new(),
    })]
    #[case::start_reply(StartSessionResponse {
        name: "alpha".to_owned(),
        path: "/work".to_owned(),
        layout_name: "dev".to_owned(),
    })]
    #[case::kill(KillSessionRequest { name: "alpha".to_owned() })]
    #[case::rename_session(RenameSessionRequest { old_name: "a".to_owned(), new_name: "b".to_owned() })]
    #[case::rename_session_reply(RenameSessionResponse { new_name: "b".to_owned() })]
    #[case::focus_session(SessionFocusRequest { name: "b".to_owned() })]
    #[case::rename_pane(RenamePaneRequest {
        session_name: "alpha".to_owned(),
        pane_index: "1".to_owned(),
        new_title: "logs".to_owned(),
    })]
    #[case::split(SplitPaneRequest {
        session_name: "alpha".to_owned(),
        pane_index: "0".to_owned(),
        vertical: true,
        percent: 30,
    })]
    #[case::split_reply(SplitPaneResponse { new_index: "2".to_owned() })]
    #[case::close(ClosePaneRequest { session_name: "alpha".to_owned(), pane_index: "2".to_owned() })]
    #[case::swap(SwapPanesRequest {
        session_name: "alpha".to_owned(),
        pane_a: "0".to_owned(),
        pane_b: "1".to_owned(),
    })]
    #[case::input(SendInputRequest { pane_id: "p-1".to_owned(), input: b"ls\r\x1b[A".to_vec() })]
    #[case::empty_input(SendInputRequest { pane_id: "p-1".to_owned(), input: Vec::new() })]
    #[case::mouse(SendMouseRequest {
        pane_id: "p-1".to_owned(),
        event: MouseEventPayload {
            x: 12,
            y: 4,
            button: 1,
            action: MouseAction::Press,
            shift: false,
            alt: true,
            ctrl: false,
            wheel: false,
        },
    })]
    #[case::resize(ResizePaneRequest { pane_id: "p-1".to_owned(), cols: 132, rows: 43 })]
    #[case::focus_pane(PaneFocusRequest { pane_id: "p-1".to_owned() })]
    #[case::tags(PaneTagRequest { pane_id: "p-1".to_owned(), tags: strings(&["ci", "hot"]) })]
    #[case::tag_list(PaneTagListResponse { pane_id: "p-1".to_owned(), tags: Vec::new() })]
    #[case::signal(PaneSignalRequest { pane_id: "p-1".to_owned(), signal: "INT".to_owned() })]
    #[case::view(PaneViewRequest {
        pane_id: "p-3".to_owned(),
        cols: 120,
        rows: 40,
        mode: PaneViewMode::Styled,
        show_cursor: true,
        color_profile: ColorProfile::Ansi256,
        deadline_unix_nano: 1_700_000_000_000_000_000,
        known_seq: 9,
        priority: PaneViewPriority::Focused,
        direct_render: true,
    })]
    #[case::view_reply(PaneViewResponse {
        pane_id: "p-3".to_owned(),
        cols: 120,
        rows: 2,
        update_seq: 10,
        frame: Frame {
            lines: strings(&["\u{1b}[1mhello\u{1b}[0m", "wörld"]),
            cursor: Cursor { col: 5, row: 1, visible: true },
        },
        has_pointer_mode: true,
        ..PaneViewResponse::default()
    })]
    #[case::view_unchanged(PaneViewResponse {
        pane_id: "p-3".to_owned(),
        update_seq: 10,
        not_modified: true,
        ..PaneViewResponse::default()
    })]
    #[case::terminal_action(TerminalActionRequest {
        pane_id: "p-1".to_owned(),
        action: TerminalAction::ScrollUp,
        delta_x: -2,
        delta_y: 5,
        lines: 10,
    })]
    #[case::terminal_action_reply(TerminalActionResponse { pane_id: "p-1".to_owned(), text: String::new() })]
    #[case::key(TerminalKeyRequest {
        pane_id: "p-1".to_owned(),
        key: "ctrl+c".to_owned(),
        scrollback_toggle: false,
        copy_toggle: true,
    })]
    #[case::key_reply(TerminalKeyResponse {
        handled: true,
        toast: "copied".to_owned(),
        toast_level: ToastLevel::Success,
        yank_text: "selection".to_owned(),
    })]
    #[case::output(PaneOutputRequest { pane_id: "p-1".to_owned(), since_seq: 4, limit: 50, wait: true })]
    #[case::output_reply(PaneOutputResponse {
        pane_id: "p-1".to_owned(),
        lines: vec![OutputLine { seq: 5, text: "done".to_owned(), at_unix_ms: 17 }],
        next_seq: 6,
        truncated: true,
    })]
    #[case::pane_snapshot(PaneSnapshotRequest { pane_id: "p-1".to_owned(), rows: 0 })]
    #[case::pane_snapshot_reply(PaneSnapshotResponse {
        pane_id: "p-1".to_owned(),
        rows: 2,
        content: "a\nb".to_owned(),
        truncated: false,
    })]
    #[case::history(PaneHistoryRequest { pane_id: "p-1".to_owned(), limit: 5, since_unix_ms: -1 })]
    #[case::history_reply(PaneHistoryResponse {
        pane_id: "p-1".to_owned(),
        entries: vec![PaneActionEntry {
            at_unix_ms: 99,
            action: "send_input".to_owned(),
            summary: "ls".to_owned(),
            command: "ls".to_owned(),
            status: "ok".to_owned(),
        }],
    })]
    #[case::wait(PaneWaitRequest { pane_id: "p-1".to_owned(), pattern: "^ok$".to_owned(), timeout_ms: 0 })]
    #[case::wait_reply(PaneWaitResponse {
        pane_id: "p-1".to_owned(),
        pattern: "^ok$".to_owned(),
        matched: false,
        matched_line: String::new(),
        elapsed_ms: 250,
    })]
    #[case::relay_create(RelayCreateRequest {
        config: RelayConfig {
            from_pane_id: "p-1".to_owned(),
            to_pane_ids: strings(&["p-2"]),
            scope: "line".to_owned(),
            mode: RelayMode::Line,
        },
    })]
    #[case::relay_create_reply(RelayCreateResponse { relay: relay() })]
    #[case::relay_list(RelayListResponse { relays: vec![relay(), RelayInfo::default()] })]
    #[case::relay_stop(RelayStopRequest { id: "r-1".to_owned() })]
    #[case::replay(EventsReplayRequest {
        since_unix_ms: 10,
        until_unix_ms: 0,
        limit: 100,
        types: vec![EventType::Toast, EventType::Relay],
    })]
    #[case::replay_reply(EventsReplayResponse {
        events: vec![Event::new(EventType::PaneUpdated, 3).with_pane("p-1").with_update_seq(2)],
    })]
    #[case::event(Event::new(EventType::Toast, 42)
        .with_id("e-1")
        .with_session("alpha")
        .with_detail("built")
        .with_toast_level(ToastLevel::Warning))]
    #[case::bare_event(Event::default())]
    fn payloads_survive_round_trip<T>(#[case] value: T)
    where
        T: Serialize + DeserializeOwned + Default + PartialEq + std::fmt::Debug,
    {
        let bytes = encode_payload(&value).expect("encode");
        let decoded: T = decode_payload(&bytes).expect("decode");
        assert_eq!(decoded, value);
    }

    #[test]
    fn malformed_bytes_name_the_target_type() {
        let error = decode_payload::<StartSessionRequest>(b"{not json").expect_err("decode");
        assert!(error.to_string().contains("StartSessionRequest"));
    }
}
