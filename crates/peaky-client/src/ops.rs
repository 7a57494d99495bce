//! Typed wrappers, one per catalog operation.
//!
//! Each wrapper builds the request payload, performs the call through
//! [`Client::call_typed`] and unpacks the interesting part of the response.
//! Operations without a meaningful response return `()`.

use peaky_protocol::payloads::{
    ClosePaneRequest, EventsReplayRequest, EventsReplayResponse, HelloRequest, HelloResponse,
    KillSessionRequest, MouseEventPayload, PaneFocusRequest, PaneHistoryRequest,
    PaneHistoryResponse, PaneOutputRequest, PaneOutputResponse, PaneSignalRequest,
    PaneSnapshotRequest, PaneSnapshotResponse, PaneTagListResponse, PaneTagRequest,
    PaneViewRequest, PaneViewResponse, PaneWaitRequest, PaneWaitResponse, RelayConfig,
    RelayCreateRequest, RelayCreateResponse, RelayInfo, RelayListResponse, RelayStopRequest,
    RenamePaneRequest, RenameSessionRequest, RenameSessionResponse, ResizePaneRequest,
    SendInputRequest, SendMouseRequest, SessionFocusRequest, SessionNamesResponse,
    SnapshotRequest, SnapshotResponse, SplitPaneRequest, SplitPaneResponse, StartSessionRequest,
    StartSessionResponse, SwapPanesRequest, TerminalActionRequest, TerminalActionResponse,
    TerminalKeyRequest, TerminalKeyResponse,
};
use peaky_protocol::{Context, Event, Op, encode_payload};
use serde::Serialize;

use crate::client::Client;
use crate::errors::ClientError;

impl Client {
    fn call_unit<Req: Serialize + ?Sized>(
        &self,
        context: &Context,
        op: Op,
        request: &Req,
    ) -> Result<(), ClientError> {
        self.call(context, op, encode_payload(request)?).map(drop)
    }

    /// Repeats the handshake, returning the daemon's version and PID.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn hello(&self, context: &Context, version: &str) -> Result<HelloResponse, ClientError> {
        let request = HelloRequest {
            version: version.to_owned(),
            client_id: String::new(),
        };
        self.call_typed(context, Op::Hello, &request)
    }

    /// Names of every live session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn session_names(&self, context: &Context) -> Result<Vec<String>, ClientError> {
        let response: SessionNamesResponse = self.call_typed(context, Op::SessionNames, &())?;
        Ok(response.names)
    }

    /// Dashboard snapshot with up to `preview_lines` output lines per pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn snapshot(&self, context: &Context, preview_lines: usize) -> Result<SnapshotResponse, ClientError> {
        self.call_typed(context, Op::Snapshot, &SnapshotRequest { preview_lines })
    }

    /// Starts a session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn start_session(
        &self,
        context: &Context,
        request: &StartSessionRequest,
    ) -> Result<StartSessionResponse, ClientError> {
        self.call_typed(context, Op::StartSession, request)
    }

    /// Kills the session `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn kill_session(&self, context: &Context, name: &str) -> Result<(), ClientError> {
        let request = KillSessionRequest {
            name: name.to_owned(),
        };
        self.call_unit(context, Op::KillSession, &request)
    }

    /// Renames a session, returning the name the daemon settled on.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn rename_session(
        &self,
        context: &Context,
        old_name: &str,
        new_name: &str,
    ) -> Result<String, ClientError> {
        let request = RenameSessionRequest {
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned(),
        };
        let response: RenameSessionResponse = self.call_typed(context, Op::RenameSession, &request)?;
        Ok(response.new_name)
    }

    /// Marks a session as focused.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn focus_session(&self, context: &Context, name: &str) -> Result<(), ClientError> {
        let request = SessionFocusRequest {
            name: name.to_owned(),
        };
        self.call_unit(context, Op::SessionFocus, &request)
    }

    /// Retitles a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn rename_pane(
        &self,
        context: &Context,
        session_name: &str,
        pane_index: &str,
        new_title: &str,
    ) -> Result<(), ClientError> {
        let request = RenamePaneRequest {
            session_name: session_name.to_owned(),
            pane_index: pane_index.to_owned(),
            new_title: new_title.to_owned(),
        };
        self.call_unit(context, Op::RenamePane, &request)
    }

    /// Splits a pane, returning the new pane's index.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn split_pane(&self, context: &Context, request: &SplitPaneRequest) -> Result<String, ClientError> {
        let response: SplitPaneResponse = self.call_typed(context, Op::SplitPane, request)?;
        Ok(response.new_index)
    }

    /// Closes a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn close_pane(&self, context: &Context, session_name: &str, pane_index: &str) -> Result<(), ClientError> {
        let request = ClosePaneRequest {
            session_name: session_name.to_owned(),
            pane_index: pane_index.to_owned(),
        };
        self.call_unit(context, Op::ClosePane, &request)
    }

    /// Swaps two panes of a session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn swap_panes(
        &self,
        context: &Context,
        session_name: &str,
        pane_a: &str,
        pane_b: &str,
    ) -> Result<(), ClientError> {
        let request = SwapPanesRequest {
            session_name: session_name.to_owned(),
            pane_a: pane_a.to_owned(),
            pane_b: pane_b.to_owned(),
        };
        self.call_unit(context, Op::SwapPanes, &request)
    }

    /// Writes raw bytes to a pane's input.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn send_input(&self, context: &Context, pane_id: &str, input: &[u8]) -> Result<(), ClientError> {
        let request = SendInputRequest {
            pane_id: pane_id.to_owned(),
            input: input.to_vec(),
        };
        self.call_unit(context, Op::SendInput, &request)
    }

    /// Forwards a mouse event to a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn send_mouse(&self, context: &Context, pane_id: &str, event: MouseEventPayload) -> Result<(), ClientError> {
        let request = SendMouseRequest {
            pane_id: pane_id.to_owned(),
            event,
        };
        self.call_unit(context, Op::SendMouse, &request)
    }

    /// Resizes a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn resize_pane(&self, context: &Context, pane_id: &str, cols: u16, rows: u16) -> Result<(), ClientError> {
        let request = ResizePaneRequest {
            pane_id: pane_id.to_owned(),
            cols,
            rows,
        };
        self.call_unit(context, Op::ResizePane, &request)
    }

    /// Renders a pane as a character grid.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn pane_view(&self, context: &Context, request: &PaneViewRequest) -> Result<PaneViewResponse, ClientError> {
        self.call_typed(context, Op::PaneView, request)
    }

    /// Runs a scrollback or copy-mode action.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn terminal_action(
        &self,
        context: &Context,
        request: &TerminalActionRequest,
    ) -> Result<TerminalActionResponse, ClientError> {
        self.call_typed(context, Op::TerminalAction, request)
    }

    /// Lets the daemon decide whether a key belongs to scrollback or copy
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn handle_key(&self, context: &Context, request: &TerminalKeyRequest) -> Result<TerminalKeyResponse, ClientError> {
        self.call_typed(context, Op::HandleKey, request)
    }

    /// Marks a pane as focused.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn focus_pane(&self, context: &Context, pane_id: &str) -> Result<(), ClientError> {
        self.call_unit(context, Op::PaneFocus, &PaneFocusRequest { pane_id: pane_id.to_owned() })
    }

    /// Buffered output lines of a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn pane_output(&self, context: &Context, request: &PaneOutputRequest) -> Result<PaneOutputResponse, ClientError> {
        self.call_typed(context, Op::PaneOutput, request)
    }

    /// Scrollback snapshot of the last `rows` lines of a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn pane_snapshot(&self, context: &Context, pane_id: &str, rows: usize) -> Result<PaneSnapshotResponse, ClientError> {
        let request = PaneSnapshotRequest {
            pane_id: pane_id.to_owned(),
            rows,
        };
        self.call_typed(context, Op::PaneSnapshot, &request)
    }

    /// Action history of a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn pane_history(&self, context: &Context, request: &PaneHistoryRequest) -> Result<PaneHistoryResponse, ClientError> {
        self.call_typed(context, Op::PaneHistory, request)
    }

    /// Waits for a pane output line matching a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn pane_wait(&self, context: &Context, request: &PaneWaitRequest) -> Result<PaneWaitResponse, ClientError> {
        self.call_typed(context, Op::PaneWait, request)
    }

    /// Adds tags to a pane, returning its full tag list.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn add_tags(&self, context: &Context, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ClientError> {
        self.tag_call(context, Op::PaneTagAdd, pane_id, tags)
    }

    /// Removes tags from a pane, returning the tags left.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn remove_tags(&self, context: &Context, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ClientError> {
        self.tag_call(context, Op::PaneTagRemove, pane_id, tags)
    }

    /// Tags of a pane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn list_tags(&self, context: &Context, pane_id: &str) -> Result<Vec<String>, ClientError> {
        self.tag_call(context, Op::PaneTagList, pane_id, &[])
    }

    fn tag_call(&self, context: &Context, op: Op, pane_id: &str, tags: &[String]) -> Result<Vec<String>, ClientError> {
        let request = PaneTagRequest {
            pane_id: pane_id.to_owned(),
            tags: tags.to_vec(),
        };
        let response: PaneTagListResponse = self.call_typed(context, op, &request)?;
        Ok(response.tags)
    }

    /// Sends a named signal (for example `"SIGINT"`) to a pane's process.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn signal_pane(&self, context: &Context, pane_id: &str, signal: &str) -> Result<(), ClientError> {
        let request = PaneSignalRequest {
            pane_id: pane_id.to_owned(),
            signal: signal.to_owned(),
        };
        self.call_unit(context, Op::PaneSignal, &request)
    }

    /// Starts an output relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn create_relay(&self, context: &Context, config: RelayConfig) -> Result<RelayInfo, ClientError> {
        let response: RelayCreateResponse =
            self.call_typed(context, Op::RelayCreate, &RelayCreateRequest { config })?;
        Ok(response.relay)
    }

    /// Running relays.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn list_relays(&self, context: &Context) -> Result<Vec<RelayInfo>, ClientError> {
        let response: RelayListResponse = self.call_typed(context, Op::RelayList, &())?;
        Ok(response.relays)
    }

    /// Stops one relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn stop_relay(&self, context: &Context, id: &str) -> Result<(), ClientError> {
        self.call_unit(context, Op::RelayStop, &RelayStopRequest { id: id.to_owned() })
    }

    /// Stops every relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn stop_all_relays(&self, context: &Context) -> Result<(), ClientError> {
        self.call_unit(context, Op::RelayStopAll, &())
    }

    /// Replays logged daemon events.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub fn replay_events(&self, context: &Context, request: &EventsReplayRequest) -> Result<Vec<Event>, ClientError> {
        let response: EventsReplayResponse = self.call_typed(context, Op::EventsReplay, request)?;
        Ok(response.events)
    }
}
