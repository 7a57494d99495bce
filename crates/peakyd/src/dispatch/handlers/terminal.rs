//! Scrollback, copy-mode, key and inline pane-view handlers.

use peaky_protocol::Context;
use peaky_protocol::payloads::{PaneViewRequest, TerminalActionRequest, TerminalKeyRequest};

use super::{decode, encode, require_pane_id};
use crate::dispatch::DispatchError;
use crate::pane_view::{render_context, render_pane_view};
use crate::state::DaemonState;

pub(super) fn terminal_action(
    state: &DaemonState,
    payload: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    let mut request: TerminalActionRequest = decode(payload)?;
    request.pane_id = require_pane_id(&request.pane_id)?.to_owned();
    encode(&state.manager().terminal_action(&request)?)
}

pub(super) fn handle_key(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let mut request: TerminalKeyRequest = decode(payload)?;
    request.pane_id = require_pane_id(&request.pane_id)?.to_owned();
    encode(&state.manager().handle_key(&request)?)
}

/// Renders without a cache; connections schedule their view requests
/// instead of routing them here.
pub(super) fn pane_view(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneViewRequest = decode(payload)?;
    let context = render_context(&Context::background(), &request);
    let response = render_pane_view(state.manager().as_ref(), &context, &request, None)?;
    encode(&response)
}
