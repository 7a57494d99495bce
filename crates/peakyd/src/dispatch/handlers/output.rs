//! Output history, scrollback, action history and pattern-wait handlers.

use std::time::{Duration, Instant};

use peaky_protocol::payloads::{
    PaneHistoryRequest, PaneHistoryResponse, PaneOutputRequest, PaneOutputResponse,
    PaneSnapshotRequest, PaneSnapshotResponse, PaneWaitRequest, PaneWaitResponse,
};
use peaky_protocol::{Context, OPERATION_TIMEOUT};
use regex::Regex;

use super::{decode, encode, require_pane_id};
use crate::dispatch::DispatchError;
use crate::state::DaemonState;

/// Serves three modes: the last `limit` lines (no `since_seq`, no wait),
/// lines after `since_seq`, or a long poll that waits up to the operation
/// timeout for the first new line.
pub(super) fn pane_output(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneOutputRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let manager = state.manager();
    loop {
        let (mut lines, next_seq, mut truncated) =
            if request.since_seq == 0 && request.limit > 0 && !request.wait {
                let lines = manager.output_snapshot(pane_id, request.limit)?;
                let next = lines.last().map_or(0, |line| line.seq);
                (lines, next, false)
            } else {
                let since = manager.output_since(pane_id, request.since_seq)?;
                (since.lines, since.next_seq, since.truncated)
            };
        if request.limit > 0 && lines.len() > request.limit {
            lines.drain(..lines.len() - request.limit);
            truncated = true;
        }
        if !lines.is_empty() || !request.wait {
            return encode(&PaneOutputResponse {
                pane_id: pane_id.to_owned(),
                lines,
                next_seq,
                truncated,
            });
        }
        let context = Context::background().with_timeout(OPERATION_TIMEOUT);
        if !manager.wait_for_output(&context, pane_id) {
            return encode(&PaneOutputResponse {
                pane_id: pane_id.to_owned(),
                lines: Vec::new(),
                next_seq: request.since_seq,
                truncated,
            });
        }
    }
}

pub(super) fn pane_snapshot(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneSnapshotRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let snapshot = state.manager().scrollback_snapshot(pane_id, request.rows)?;
    encode(&PaneSnapshotResponse {
        pane_id: pane_id.to_owned(),
        rows: request.rows,
        content: snapshot.content,
        truncated: snapshot.truncated,
    })
}

pub(super) fn pane_history(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneHistoryRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    encode(&PaneHistoryResponse {
        pane_id: pane_id.to_owned(),
        entries: state.pane_history(pane_id, request.since_unix_ms, request.limit),
    })
}

/// Waits for an output line newer than the call matching the pattern. A
/// zero timeout waits until the pane or the engine goes away.
pub(super) fn pane_wait(state: &DaemonState, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: PaneWaitRequest = decode(payload)?;
    let pane_id = require_pane_id(&request.pane_id)?;
    let pattern = request.pattern.trim();
    if pattern.is_empty() {
        return Err(DispatchError::invalid_argument("pattern is required"));
    }
    let matcher = Regex::new(pattern).map_err(DispatchError::Pattern)?;
    let manager = state.manager();

    let started = Instant::now();
    let context = match request.timeout_ms {
        0 => Context::background(),
        timeout => Context::background().with_timeout(Duration::from_millis(timeout)),
    };
    let respond = |matched_line: Option<String>| {
        encode(&PaneWaitResponse {
            pane_id: pane_id.to_owned(),
            pattern: pattern.to_owned(),
            matched: matched_line.is_some(),
            matched_line: matched_line.unwrap_or_default(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    };

    let mut seq = manager.output_since(pane_id, 0)?.next_seq;
    loop {
        let since = manager.output_since(pane_id, seq)?;
        if let Some(line) = since.lines.iter().find(|line| matcher.is_match(&line.text)) {
            return respond(Some(line.text.clone()));
        }
        seq = since.next_seq;
        if context.is_done() || !manager.wait_for_output(&context, pane_id) {
            return respond(None);
        }
    }
}
