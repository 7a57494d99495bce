use camino::{Utf8Path, Utf8PathBuf};
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

/// Environment variable overriding the default socket path.
pub const SOCKET_ENV: &str = "PEAKYPANES_SOCKET";

/// Environment variable overriding the default PID file path.
pub const PID_FILE_ENV: &str = "PEAKYPANES_PID_FILE";

/// Directory created beneath the runtime base for daemon artefacts.
pub const RUNTIME_NAMESPACE: &str = "peakypanes";

/// File name of the daemon socket inside the runtime directory.
pub const SOCKET_FILE_NAME: &str = "daemon.sock";

/// File name of the PID file written beside the socket.
pub const PID_FILE_NAME: &str = "daemon.pid";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default daemon socket path.
///
/// `PEAKYPANES_SOCKET` wins when set and non-empty. Otherwise the socket
/// lives in `<runtime dir>/peakypanes/`, falling back to a per-user
/// directory beneath the system temporary directory.
#[must_use]
pub fn default_socket_path() -> Utf8PathBuf {
    if let Some(path) = env_path(SOCKET_ENV) {
        return path;
    }
    default_runtime_directory().join(SOCKET_FILE_NAME)
}

/// Computes the default PID file path for a daemon bound to `socket`.
///
/// `PEAKYPANES_PID_FILE` wins when set and non-empty; otherwise the PID file
/// sits beside the socket.
#[must_use]
pub fn default_pid_path(socket: &Utf8Path) -> Utf8PathBuf {
    if let Some(path) = env_path(PID_FILE_ENV) {
        return path;
    }
    socket.with_file_name(PID_FILE_NAME)
}

fn env_path(key: &str) -> Option<Utf8PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(Utf8PathBuf::from)
}

/// Directory that holds the socket when no override is configured.
#[cfg(unix)]
#[must_use]
pub fn default_runtime_directory() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push(RUNTIME_NAMESPACE);
    if apply_namespace {
        base.push(user_namespace());
    }
    base
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

/// Directory that holds the socket when no override is configured.
#[cfg(not(unix))]
#[must_use]
pub fn default_runtime_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    let mut base =
        Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("."));
    base.push(RUNTIME_NAMESPACE);
    base
}
