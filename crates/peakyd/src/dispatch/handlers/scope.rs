//! Resolution of relay scopes (`all`, `session`, `project`) to pane IDs.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use peaky_protocol::payloads::SessionSnapshot;

use crate::dispatch::DispatchError;
use crate::state::{DaemonState, Focus};

/// Pane IDs covered by `scope`, in snapshot order without duplicates.
pub(super) fn resolve_targets(state: &DaemonState, scope: &str) -> Result<Vec<String>, DispatchError> {
    let scope = scope.trim();
    if scope.is_empty() {
        return Err(DispatchError::invalid_argument("scope is required"));
    }
    let sessions = state.manager().snapshot(0);
    if sessions.is_empty() {
        return Err(DispatchError::invalid_argument("no sessions available"));
    }
    let focus = state.focus();
    match scope.to_ascii_lowercase().as_str() {
        "all" => Ok(pane_ids(sessions.iter())),
        "session" => {
            let name = focused_session(&focus, &sessions)
                .ok_or_else(|| DispatchError::invalid_argument("focused session unavailable"))?;
            Ok(pane_ids(sessions.iter().filter(|session| session.name == name)))
        }
        "project" => {
            let path = focused_project(&focus, &sessions)
                .ok_or_else(|| DispatchError::invalid_argument("focused project unavailable"))?;
            Ok(pane_ids(
                sessions
                    .iter()
                    .filter(|session| normalise(&session.path).as_ref() == Some(&path)),
            ))
        }
        _ => Err(DispatchError::invalid_argument(format!(
            "unknown scope {scope:?}"
        ))),
    }
}

fn pane_ids<'a>(sessions: impl Iterator<Item = &'a SessionSnapshot>) -> Vec<String> {
    let mut seen = HashSet::new();
    sessions
        .flat_map(|session| session.panes.iter())
        .filter(|pane| !pane.id.is_empty() && seen.insert(pane.id.clone()))
        .map(|pane| pane.id.clone())
        .collect()
}

/// The focused session, else the session holding the focused pane, else the
/// only session.
fn focused_session(focus: &Focus, sessions: &[SessionSnapshot]) -> Option<String> {
    if !focus.session.is_empty() {
        return Some(focus.session.clone());
    }
    if !focus.pane.is_empty()
        && let Some(session) = sessions
            .iter()
            .find(|session| session.panes.iter().any(|pane| pane.id == focus.pane))
    {
        return Some(session.name.clone());
    }
    match sessions {
        [only] => Some(only.name.clone()),
        _ => None,
    }
}

/// The focused session's project path, else the one project path shared by
/// every session that has one.
fn focused_project(focus: &Focus, sessions: &[SessionSnapshot]) -> Option<PathBuf> {
    if let Some(name) = focused_session(focus, sessions)
        && let Some(session) = sessions.iter().find(|session| session.name == name)
    {
        return normalise(&session.path);
    }
    let paths: HashSet<PathBuf> = sessions
        .iter()
        .filter_map(|session| normalise(&session.path))
        .collect();
    if paths.len() == 1 {
        paths.into_iter().next()
    } else {
        None
    }
}

/// Lexically cleans `path`, anchoring relative paths at the working
/// directory.
fn normalise(path: &str) -> Option<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let path = Path::new(path);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    Some(cleaned)
}
