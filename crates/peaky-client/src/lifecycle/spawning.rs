//! Daemon process spawning.

use std::env;
use std::ffi::{OsStr, OsString};
use std::process::{Child, Command, Stdio};

use camino::Utf8Path;
use tracing::debug;

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;

/// Environment variable naming the daemon binary.
pub const DAEMON_BIN_ENV: &str = "PEAKYD_BIN";

const DEFAULT_DAEMON_BIN: &str = "peakyd";

/// Spawns the daemon bound to `socket`, recording its PID in `pid_file`.
///
/// Uses the binary override if provided, otherwise falls back to the
/// `PEAKYD_BIN` environment variable or the default `peakyd` binary name.
pub(super) fn spawn_daemon(
    socket: &Utf8Path,
    pid_file: &Utf8Path,
    binary_override: Option<&OsStr>,
) -> Result<Child, LifecycleError> {
    let binary = resolve_daemon_binary(binary_override);
    debug!(target: LIFECYCLE_TARGET, binary = ?binary, %socket, "spawning daemon");
    Command::new(&binary)
        .arg("--daemon-socket")
        .arg(socket.as_str())
        .arg("--pid-file")
        .arg(pid_file.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| LifecycleError::LaunchDaemon { binary, source })
}

fn resolve_daemon_binary(binary_override: Option<&OsStr>) -> OsString {
    binary_override
        .map(OsString::from)
        .or_else(|| env::var_os(DAEMON_BIN_ENV))
        .unwrap_or_else(|| OsString::from(DEFAULT_DAEMON_BIN))
}
