//! Pane lifecycle, input, focus, tag and signal handlers.

use peaky_protocol::payloads::{
    ClosePaneRequest, MouseAction, PaneFocusRequest, PaneSignalRequest, PaneTagListResponse,
    PaneTagRequest, RenamePaneRequest, ResizePaneRequest, SendInputRequest, SendMouseRequest,
    SplitPaneRequest, SplitPaneResponse, SwapPanesRequest,
};
use peaky_protocol::{Event, EventType};

use super::{decode, encode, require_pane_id, validate_pane_index, validate_session_name};
use crate::dispatch::DispatchError;
use crate::state::DaemonState;

const OK: &str = "ok";

pub(super) fn rename_pane(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: RenamePaneRequest = decode(payload)?;
    let title = request.new_title.trim();
    if title.is_empty() {
        return Err(DispatchError::invalid_argument("pane title is required"));
    }
    let session = validate_session_name(&request.session_name)?;
    let index = validate_pane_index(&request.pane_index)?;
    state.manager().rename_pane(session, index, title)?;
    Ok(Vec::new())
}

pub(super) fn split_pane(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: SplitPaneRequest = decode(payload)?;
    let session = validate_session_name(&request.session_name)?;
    let index = validate_pane_index(&request.pane_index)?;
    let new_index = state
        .manager()
        .split_pane(session, index, request.vertical, request.percent)?;
    encode(&SplitPaneResponse { new_index })
}

pub(super) fn close_pane(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: ClosePaneRequest = decode(payload)?;
    let session = validate_session_name(&request.session_name)?;
    let index = validate_pane_index(&request.pane_index)?;
    state.manager().close_pane(session, index)?;
    Ok(Vec::new())
}

pub(super) fn swap_panes(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: SwapPanesRequest = decode(payload)?;
    let session = validate_session_name(&request.session_name)?;
    let first = validate_pane_index(&request.pane_a)?;
    let second = validate_pane_index(&request.pane_b)?;
    state.manager().swap_panes(session, first, second)?;
    Ok(Vec::new())
}

pub(super) fn send_input(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: SendInputRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    state.manager().send_input(pane_id, &request.input)?;
    let summary = format!("{} bytes", request.input.len());
    state.record_action(pane_id, "send", &summary, OK);
    Ok(Vec::new())
}

pub(super) fn send_mouse(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: SendMouseRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    // Events the engine cannot route are dropped without failing the call.
    if request.event.action == MouseAction::Unknown {
        return Ok(Vec::new());
    }
    state.manager().send_mouse(pane_id, &request.event)?;
    Ok(Vec::new())
}

pub(super) fn resize_pane(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: ResizePaneRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let window = state
        .manager()
        .window(pane_id)
        .ok_or_else(|| DispatchError::pane_not_found(pane_id))?;
    window.resize(request.cols.max(1), request.rows.max(1))?;
    Ok(Vec::new())
}

pub(super) fn pane_focus(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneFocusRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let session = state
        .manager()
        .snapshot(0)
        .into_iter()
        .find(|session| session.panes.iter().any(|pane| pane.id == pane_id))
        .map(|session| session.name);
    state.focus_pane(pane_id, session.as_deref());
    state.record_action(pane_id, "focus", "Focused pane", OK);
    let mut event = Event::new(EventType::FocusChanged, 0).with_pane(pane_id);
    if let Some(session) = session {
        event = event.with_session(session);
    }
    state.publish(event);
    Ok(Vec::new())
}

pub(super) fn tag_add(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneTagRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let tags = state.manager().add_tags(pane_id, &request.tags)?;
    state.record_action(pane_id, "tag.add", &request.tags.join(","), OK);
    encode(&PaneTagListResponse {
        pane_id: pane_id.to_owned(),
        tags,
    })
}

pub(super) fn tag_remove(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneTagRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let tags = state.manager().remove_tags(pane_id, &request.tags)?;
    state.record_action(pane_id, "tag.remove", &request.tags.join(","), OK);
    encode(&PaneTagListResponse {
        pane_id: pane_id.to_owned(),
        tags,
    })
}

pub(super) fn tag_list(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneTagRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let tags = state.manager().tags(pane_id)?;
    encode(&PaneTagListResponse {
        pane_id: pane_id.to_owned(),
        tags,
    })
}

pub(super) fn signal(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneSignalRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    state.manager().signal_pane(pane_id, &request.signal)?;
    state.record_action(pane_id, "signal", &request.signal, OK);
    Ok(Vec::new())
}
