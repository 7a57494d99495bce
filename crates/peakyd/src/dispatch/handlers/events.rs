//! Event log replay.

use peaky_protocol::payloads::{EventsReplayRequest, EventsReplayResponse};

use super::{decode, encode};
use crate::dispatch::DispatchError;
use crate::eventlog::TimeRange;
use crate::state::DaemonState;

pub(super) fn replay(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: EventsReplayRequest = decode(payload)?;
    let range = TimeRange {
        since_unix_ms: request.since_unix_ms,
        until_unix_ms: request.until_unix_ms,
    };
    encode(&EventsReplayResponse {
        events: state.replay(range, request.limit, &request.types),
    })
}
