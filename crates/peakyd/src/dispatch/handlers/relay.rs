//! Relay management handlers.

use peaky_protocol::payloads::{
    RelayCreateRequest, RelayCreateResponse, RelayListResponse, RelayStopRequest,
};
use peaky_protocol::{Event, EventType};

use super::scope::resolve_targets;
use super::{decode, encode};
use crate::dispatch::DispatchError;
use crate::state::DaemonState;

/// Starts a relay. Without explicit targets, the scope picks them.
pub(super) fn create(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: RelayCreateRequest = decode(payload)?;
    let mut config = request.config;
    if config.to_pane_ids.is_empty() && !config.scope.trim().is_empty() {
        config.to_pane_ids = resolve_targets(state, &config.scope)?;
    }
    let relay = state
        .relays()
        .create(std::sync::Arc::clone(state.manager()), &config)?;
    state.publish(
        Event::new(EventType::Relay, 0)
            .with_id(relay.id.as_str())
            .with_pane(relay.from_pane_id.as_str())
            .with_detail("running"),
    );
    encode(&RelayCreateResponse { relay })
}

pub(super) fn list(state: &DaemonState, _: &[u8]) -> Result<Vec<u8>, DispatchError> {
    encode(&RelayListResponse {
        relays: state.relays().list(),
    })
}

pub(super) fn stop(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: RelayStopRequest = decode(payload)?;
    let relay = state.relays().stop(&request.id)?;
    state.publish(
        Event::new(EventType::Relay, 0)
            .with_id(relay.id.as_str())
            .with_pane(relay.from_pane_id.as_str())
            .with_detail("stopped"),
    );
    Ok(Vec::new())
}

pub(super) fn stop_all(state: &DaemonState, _: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let stopped = state.relays().stop_all();
    if stopped > 0 {
        state.publish(Event::new(EventType::Relay, 0).with_detail(format!("stopped {stopped}")));
    }
    Ok(Vec::new())
}
