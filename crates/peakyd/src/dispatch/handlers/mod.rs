//! Handler functions, one per catalog operation, and the validation helpers
//! they share.

use peaky_protocol::{Op, decode_payload, encode_payload};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::errors::DispatchError;
use super::router::Handler;

mod events;
mod output;
mod pane;
mod relay;
mod scope;
mod session;
mod terminal;

/// Handler serving `op`.
pub(super) fn handler_for(op: Op) -> Handler {
    match op {
        Op::Hello => session::hello,
        Op::SessionNames => session::session_names,
        Op::Snapshot => session::snapshot,
        Op::StartSession => session::start_session,
        Op::KillSession => session::kill_session,
        Op::RenameSession => session::rename_session,
        Op::SessionFocus => session::session_focus,
        Op::RenamePane => pane::rename_pane,
        Op::SplitPane => pane::split_pane,
        Op::ClosePane => pane::close_pane,
        Op::SwapPanes => pane::swap_panes,
        Op::SendInput => pane::send_input,
        Op::SendMouse => pane::send_mouse,
        Op::ResizePane => pane::resize_pane,
        Op::PaneFocus => pane::pane_focus,
        Op::PaneTagAdd => pane::tag_add,
        Op::PaneTagRemove => pane::tag_remove,
        Op::PaneTagList => pane::tag_list,
        Op::PaneSignal => pane::signal,
        Op::PaneView => terminal::pane_view,
        Op::TerminalAction => terminal::terminal_action,
        Op::HandleKey => terminal::handle_key,
        Op::PaneOutput => output::pane_output,
        Op::PaneSnapshot => output::pane_snapshot,
        Op::PaneHistory => output::pane_history,
        Op::PaneWait => output::pane_wait,
        Op::RelayCreate => relay::create,
        Op::RelayList => relay::list,
        Op::RelayStop => relay::stop,
        Op::RelayStopAll => relay::stop_all,
        Op::EventsReplay => events::replay,
    }
}

fn decode<T: DeserializeOwned + Default>(payload: &[u8]) -> Result<T, DispatchError> {
    Ok(decode_payload(payload)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DispatchError> {
    Ok(encode_payload(value)?)
}

fn require_pane_id(value: &str) -> Result<&str, DispatchError> {
    let pane_id = value.trim();
    if pane_id.is_empty() {
        return Err(DispatchError::invalid_argument("pane id is required"));
    }
    Ok(pane_id)
}

fn validate_session_name(value: &str) -> Result<&str, DispatchError> {
    let name = value.trim();
    if name.is_empty() {
        return Err(DispatchError::invalid_argument("session name is required"));
    }
    if name.chars().any(char::is_control) {
        return Err(DispatchError::invalid_argument(format!(
            "invalid session name {name:?}"
        )));
    }
    Ok(name)
}

fn validate_pane_index(value: &str) -> Result<&str, DispatchError> {
    let index = value.trim();
    if index.is_empty() {
        return Err(DispatchError::invalid_argument("pane index is required"));
    }
    Ok(index)
}
