//! Handshake, snapshot and session lifecycle handlers.

use peaky_protocol::payloads::{
    HelloRequest, HelloResponse, KillSessionRequest, RenameSessionRequest, RenameSessionResponse,
    SessionFocusRequest, SessionNamesResponse, SnapshotRequest, SnapshotResponse,
    StartSessionRequest,
};
use peaky_protocol::{Event, EventType};
use tracing::debug;

use super::{decode, encode, validate_session_name};
use crate::dispatch::DispatchError;
use crate::dispatch::router::DISPATCH_TARGET;
use crate::state::DaemonState;

pub(super) fn hello(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: HelloRequest = decode(payload)?;
    debug!(
        target: DISPATCH_TARGET,
        client_version = %request.version,
        client_id = %request.client_id,
        "client hello"
    );
    encode(&HelloResponse {
        version: state.version().to_owned(),
        pid: state.pid(),
    })
}

pub(super) fn session_names(state: &DaemonState, _: &[u8]) -> Result<Vec<u8>, DispatchError> {
    encode(&SessionNamesResponse {
        names: state.manager().session_names(),
    })
}

pub(super) fn snapshot(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: SnapshotRequest = decode(payload)?;
    let manager = state.manager();
    encode(&SnapshotResponse {
        version: manager.version(),
        sessions: manager.snapshot(request.preview_lines),
    })
}

pub(super) fn start_session(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let mut request: StartSessionRequest = decode(payload)?;
    request.name = validate_session_name(&request.name)?.to_owned();
    let response = state.manager().start_session(&request)?;
    state.publish(Event::new(EventType::SessionChanged, 0).with_session(response.name.as_str()));
    encode(&response)
}

pub(super) fn kill_session(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: KillSessionRequest = decode(payload)?;
    let name = validate_session_name(&request.name)?;
    state.manager().kill_session(name)?;
    state.publish(Event::new(EventType::SessionChanged, 0).with_session(name));
    Ok(Vec::new())
}

pub(super) fn rename_session(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: RenameSessionRequest = decode(payload)?;
    let old_name = validate_session_name(&request.old_name)?;
    let new_name = validate_session_name(&request.new_name)?;
    state.manager().rename_session(old_name, new_name)?;
    state.publish(Event::new(EventType::SessionChanged, 0).with_session(new_name));
    encode(&RenameSessionResponse {
        new_name: new_name.to_owned(),
    })
}

pub(super) fn session_focus(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: SessionFocusRequest = decode(payload)?;
    let name = validate_session_name(&request.name)?;
    state.focus_session(name);
    state.publish(Event::new(EventType::FocusChanged, 0).with_session(name));
    Ok(Vec::new())
}
