//! Envelope model shared by the daemon and its clients.
//!
//! An envelope is one framed protocol message. Requests carry a correlation
//! ID chosen by the caller, responses echo that ID back, and events carry an
//! event type with a zero ID. The operation travels as text so that a daemon
//! can name an operation it does not recognise when rejecting it.
//!
//! The body layout is a compact binary record with big-endian integers and
//! length-prefixed UTF-8 strings:
//!
//! ```text
//! kind:u8 | id:u64 | op:u16+bytes | event:u16+bytes | error:u32+bytes | payload
//! ```
//!
//! The payload occupies the remainder of the body. Delimiting one body from
//! the next is the job of [`crate::frame`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Message kinds carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeKind {
    /// Caller-initiated call awaiting a response.
    Request = 1,
    /// Daemon reply correlated with a request.
    Response = 2,
    /// Unsolicited daemon notification.
    Event = 3,
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = EnvelopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Request),
            2 => Ok(Self::Response),
            3 => Ok(Self::Event),
            other => Err(EnvelopeError::UnknownKind(other)),
        }
    }
}

/// Closed catalog of operations understood by the daemon.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Op {
    /// Connection handshake.
    Hello,
    /// Lists session names.
    SessionNames,
    /// Returns a dashboard snapshot of every session.
    Snapshot,
    /// Starts a new session.
    StartSession,
    /// Kills a session.
    KillSession,
    /// Renames a session.
    RenameSession,
    /// Renames a pane.
    RenamePane,
    /// Splits a pane.
    SplitPane,
    /// Closes a pane.
    ClosePane,
    /// Swaps two panes within a session.
    SwapPanes,
    /// Forwards raw input to a pane.
    SendInput,
    /// Forwards a mouse event to a pane.
    SendMouse,
    /// Resizes a pane.
    ResizePane,
    /// Renders a pane as a character grid.
    PaneView,
    /// Runs a scrollback or copy-mode action.
    TerminalAction,
    /// Handles a key in scrollback or copy mode.
    HandleKey,
    /// Marks a session as focused.
    SessionFocus,
    /// Marks a pane as focused.
    PaneFocus,
    /// Reads buffered pane output lines.
    PaneOutput,
    /// Reads a scrollback snapshot of a pane.
    PaneSnapshot,
    /// Reads the action history of a pane.
    PaneHistory,
    /// Waits for pane output matching a pattern.
    PaneWait,
    /// Adds tags to a pane.
    PaneTagAdd,
    /// Removes tags from a pane.
    PaneTagRemove,
    /// Lists the tags of a pane.
    PaneTagList,
    /// Sends a signal to the pane's process.
    PaneSignal,
    /// Creates an output relay.
    RelayCreate,
    /// Lists output relays.
    RelayList,
    /// Stops one relay.
    RelayStop,
    /// Stops every relay.
    RelayStopAll,
    /// Replays recent daemon events.
    EventsReplay,
}

/// Catalog of asynchronous event types.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    /// Pane content changed.
    #[default]
    PaneUpdated,
    /// Pane title, tags or other metadata changed.
    PaneMetaChanged,
    /// Session list or layout changed.
    SessionChanged,
    /// User-facing notification.
    Toast,
    /// Focused session or pane changed.
    FocusChanged,
    /// New output lines are available for a pane.
    PaneOutput,
    /// Relay state changed.
    Relay,
}

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message kind.
    pub kind: EnvelopeKind,
    /// Correlation ID; zero on events.
    pub id: u64,
    /// Operation name as sent by the caller.
    pub op: String,
    /// Event type; set only on events.
    pub event: Option<EventType>,
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
    /// Failure text; non-empty only on failed responses.
    pub error: String,
}

impl Envelope {
    /// Builds a request envelope.
    #[must_use]
    pub fn request(id: u64, op: Op, payload: Vec<u8>) -> Self {
        Self {
            kind: EnvelopeKind::Request,
            id,
            op: op.to_string(),
            event: None,
            payload,
            error: String::new(),
        }
    }

    /// Builds an empty response correlated with `request`.
    #[must_use]
    pub fn response_to(request: &Self) -> Self {
        Self {
            kind: EnvelopeKind::Response,
            id: request.id,
            op: request.op.clone(),
            event: None,
            payload: Vec::new(),
            error: String::new(),
        }
    }

    /// Builds an event envelope.
    #[must_use]
    pub fn event(event: EventType, payload: Vec<u8>) -> Self {
        Self {
            kind: EnvelopeKind::Event,
            id: 0,
            op: String::new(),
            event: Some(event),
            payload,
            error: String::new(),
        }
    }

    /// Replaces the payload, clearing any error text.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self.error.clear();
        self
    }

    /// Marks the envelope as failed. A failed response carries no payload.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self.payload.clear();
        self
    }

    /// Returns `true` when the envelope carries failure text.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Parses the operation name against the catalog.
    #[must_use]
    pub fn operation(&self) -> Option<Op> {
        self.op.parse().ok()
    }

    /// Serializes the envelope body.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::FieldTooLong`] when a string field does not
    /// fit its length prefix.
    #[expect(clippy::big_endian_bytes, reason = "envelope integers are big-endian on the wire")]
    pub fn encode_body(&self) -> Result<Vec<u8>, EnvelopeError> {
        let event = self.event.map_or("", <&'static str>::from);
        let mut body = Vec::with_capacity(
            1 + 8 + 2 + self.op.len() + 2 + event.len() + 4 + self.error.len() + self.payload.len(),
        );
        body.push(self.kind as u8);
        body.extend_from_slice(&self.id.to_be_bytes());
        put_str16(&mut body, "op", &self.op)?;
        put_str16(&mut body, "event", event)?;
        put_str32(&mut body, "error", &self.error)?;
        body.extend_from_slice(&self.payload);
        Ok(body)
    }

    /// Parses an envelope body produced by [`Envelope::encode_body`].
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] when the body is truncated, names an
    /// unknown kind or event type, or carries invalid UTF-8.
    pub fn decode_body(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let mut reader = BodyReader::new(bytes);
        let kind = EnvelopeKind::try_from(reader.u8("kind")?)?;
        let id = reader.u64("id")?;
        let op = reader.str16("op")?;
        let event_name = reader.str16("event")?;
        let error = reader.str32("error")?;
        let event = if event_name.is_empty() {
            None
        } else {
            Some(
                event_name
                    .parse::<EventType>()
                    .map_err(|_| EnvelopeError::UnknownEventType(event_name.clone()))?,
            )
        };
        Ok(Self {
            kind,
            id,
            op,
            event,
            payload: reader.rest().to_vec(),
            error,
        })
    }
}

/// Errors raised while encoding or decoding an envelope body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The body ended before the named field was complete.
    #[error("envelope truncated while reading {field}")]
    Truncated {
        /// Field being read.
        field: &'static str,
    },
    /// The kind byte is not part of the protocol.
    #[error("unknown envelope kind {0}")]
    UnknownKind(u8),
    /// The event type is not part of the catalog.
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),
    /// A string field held invalid UTF-8.
    #[error("envelope field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field being read.
        field: &'static str,
    },
    /// A string field is longer than its length prefix allows.
    #[error("envelope field {field} is {len} bytes, which exceeds its length prefix")]
    FieldTooLong {
        /// Field being written.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
    },
}

#[expect(clippy::big_endian_bytes, reason = "envelope integers are big-endian on the wire")]
fn put_str16(body: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), EnvelopeError> {
    let len = u16::try_from(value.len()).map_err(|_| EnvelopeError::FieldTooLong {
        field,
        len: value.len(),
    })?;
    body.extend_from_slice(&len.to_be_bytes());
    body.extend_from_slice(value.as_bytes());
    Ok(())
}

#[expect(clippy::big_endian_bytes, reason = "envelope integers are big-endian on the wire")]
fn put_str32(body: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), EnvelopeError> {
    let len = u32::try_from(value.len()).map_err(|_| EnvelopeError::FieldTooLong {
        field,
        len: value.len(),
    })?;
    body.extend_from_slice(&len.to_be_bytes());
    body.extend_from_slice(value.as_bytes());
    Ok(())
}

struct BodyReader<'a> {
    remaining: &'a [u8],
}

impl<'a> BodyReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], EnvelopeError> {
        let (head, tail) = self
            .remaining
            .split_at_checked(len)
            .ok_or(EnvelopeError::Truncated { field })?;
        self.remaining = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], EnvelopeError> {
        let bytes = self.take(field, N)?;
        <[u8; N]>::try_from(bytes).map_err(|_| EnvelopeError::Truncated { field })
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, EnvelopeError> {
        let [byte] = self.array::<1>(field)?;
        Ok(byte)
    }

    #[expect(clippy::big_endian_bytes, reason = "envelope integers are big-endian on the wire")]
    fn u64(&mut self, field: &'static str) -> Result<u64, EnvelopeError> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    #[expect(clippy::big_endian_bytes, reason = "envelope integers are big-endian on the wire")]
    fn str16(&mut self, field: &'static str) -> Result<String, EnvelopeError> {
        let len = usize::from(u16::from_be_bytes(self.array(field)?));
        self.string(field, len)
    }

    #[expect(clippy::big_endian_bytes, reason = "envelope integers are big-endian on the wire")]
    fn str32(&mut self, field: &'static str) -> Result<String, EnvelopeError> {
        let len = u32::from_be_bytes(self.array(field)?);
        let len = usize::try_from(len).map_err(|_| EnvelopeError::Truncated { field })?;
        self.string(field, len)
    }

    fn string(&mut self, field: &'static str, len: usize) -> Result<String, EnvelopeError> {
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| EnvelopeError::InvalidUtf8 { field })
    }

    const fn rest(&self) -> &'a [u8] {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[test]
    fn request_round_trips_through_body() {
        let request = Envelope::request(7, Op::PaneView, b"{\"pane_id\":\"p1\"}".to_vec());
        let body = request.encode_body().expect("encode body");
        let decoded = Envelope::decode_body(&body).expect("decode body");
        assert_eq!(decoded, request);
        assert_eq!(decoded.operation(), Some(Op::PaneView));
    }

    #[test]
    fn response_echoes_correlation_id() {
        let request = Envelope::request(42, Op::Hello, Vec::new());
        let response = Envelope::response_to(&request).with_payload(vec![1, 2, 3]);
        assert_eq!(response.id, 42);
        assert_eq!(response.kind, EnvelopeKind::Response);
        assert_eq!(response.op, "hello");
    }

    #[test]
    fn failed_response_drops_payload() {
        let request = Envelope::request(3, Op::KillSession, Vec::new());
        let response = Envelope::response_to(&request)
            .with_payload(vec![9])
            .with_error("session not found");
        assert!(response.is_error());
        assert!(response.payload.is_empty());
        assert_eq!(response.id, 3);
    }

    #[test]
    fn event_carries_type_and_zero_id() {
        let event = Envelope::event(EventType::FocusChanged, vec![1]);
        let decoded =
            Envelope::decode_body(&event.encode_body().expect("encode")).expect("decode");
        assert_eq!(decoded.id, 0);
        assert_eq!(decoded.event, Some(EventType::FocusChanged));
    }

    #[test]
    fn unknown_operation_text_survives_the_wire() {
        let mut request = Envelope::request(1, Op::Hello, Vec::new());
        request.op = "teleport".to_owned();
        let decoded =
            Envelope::decode_body(&request.encode_body().expect("encode")).expect("decode");
        assert_eq!(decoded.op, "teleport");
        assert_eq!(decoded.operation(), None);
    }

    #[rstest]
    #[case::empty(&[][..], "kind")]
    #[case::kind_only(&[1][..], "id")]
    #[case::short_id(&[1, 0, 0, 0][..], "id")]
    fn truncated_bodies_are_rejected(#[case] body: &[u8], #[case] field: &'static str) {
        let error = Envelope::decode_body(body).expect_err("truncated body");
        assert_eq!(error, EnvelopeError::Truncated { field });
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut body = Envelope::request(1, Op::Hello, Vec::new())
            .encode_body()
            .expect("encode");
        if let Some(first) = body.first_mut() {
            *first = 9;
        }
        assert_eq!(
            Envelope::decode_body(&body),
            Err(EnvelopeError::UnknownKind(9))
        );
    }

    #[test]
    fn every_operation_name_parses_back() {
        for op in Op::iter() {
            let name: &'static str = op.into();
            assert_eq!(name.parse::<Op>().ok(), Some(op), "{name}");
        }
    }

    #[test]
    fn event_type_names_are_snake_case() {
        assert_eq!(EventType::PaneMetaChanged.to_string(), "pane_meta_changed");
        assert_eq!(EventType::iter().count(), 7);
    }
}
