//! Readiness polling and PID file reading.

use std::fs;
use std::io;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use peaky_protocol::Context;
use tracing::{debug, trace};

use super::error::LifecycleError;
use super::{DaemonOptions, LIFECYCLE_TARGET};
use crate::client::Client;

/// Polls the socket until the daemon answers `hello`.
///
/// A child that exits non-zero aborts the wait with
/// [`LifecycleError::StartupFailed`]. A clean exit means the daemon forked
/// into the background, so polling continues until the configured timeout.
pub(super) fn wait_for_ready(
    options: &DaemonOptions,
    child: &mut Child,
    context: &Context,
) -> Result<Client, LifecycleError> {
    let deadline = Instant::now() + options.startup_timeout;
    let mut daemonized = false;
    loop {
        context.check()?;
        if !daemonized
            && let Some(status) = child
                .try_wait()
                .map_err(|source| LifecycleError::MonitorChild { source })?
        {
            if !status.success() {
                return Err(LifecycleError::StartupFailed {
                    exit_status: status.code(),
                });
            }
            debug!(target: LIFECYCLE_TARGET, "daemon launcher exited; waiting for socket");
            daemonized = true;
        }
        match Client::dial(&options.socket, &options.version, context) {
            Ok(client) => return Ok(client),
            Err(error) => trace!(target: LIFECYCLE_TARGET, %error, "daemon not ready"),
        }
        if Instant::now() >= deadline {
            return Err(LifecycleError::StartupTimeout {
                socket: options.socket.clone(),
                timeout_ms: millis(options.startup_timeout),
            });
        }
        thread::sleep(options.poll_interval);
    }
}

/// Reads the daemon PID recorded at `path`.
///
/// Returns `Ok(None)` when the file is absent or empty.
pub(super) fn read_pid(path: &Utf8Path) -> Result<Option<u32>, LifecycleError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LifecycleError::ReadPid {
                path: path.to_owned(),
                source,
            });
        }
    };
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|source| LifecycleError::ParsePid {
            path: path.to_owned(),
            source,
        })
}

pub(super) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use camino::Utf8PathBuf;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        (dir, path)
    }

    #[rstest]
    #[case::absent(None, None)]
    #[case::empty(Some("  \n"), None)]
    #[case::valid(Some("4242\n"), Some(4242))]
    fn read_pid_handles_missing_and_valid_files(#[case] content: Option<&str>, #[case] expected: Option<u32>) {
        let (_dir, root) = temp_dir();
        let path = root.join("daemon.pid");
        if let Some(content) = content {
            fs::write(&path, content).expect("write pid");
        }
        assert_eq!(read_pid(&path).expect("read pid"), expected);
    }

    #[test]
    fn read_pid_rejects_garbage() {
        let (_dir, root) = temp_dir();
        let path = root.join("daemon.pid");
        fs::write(&path, "not-a-pid").expect("write pid");
        let error = read_pid(&path).expect_err("garbage rejected");
        assert!(matches!(error, LifecycleError::ParsePid { .. }));
    }

    #[test]
    fn failing_launcher_reports_its_exit_status() {
        let (_dir, root) = temp_dir();
        let options = DaemonOptions::new(root.join("daemon.sock"))
            .with_startup_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(10));
        let mut child = Command::new("sh").args(["-c", "exit 3"]).spawn().expect("spawn sh");
        let deadline = Instant::now() + Duration::from_secs(2);
        while child.try_wait().expect("try wait").is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let error = wait_for_ready(&options, &mut child, &Context::background()).expect_err("startup fails");
        assert!(matches!(error, LifecycleError::StartupFailed { exit_status: Some(3) }));
    }

    #[test]
    fn silent_daemon_times_out() {
        let (_dir, root) = temp_dir();
        let options = DaemonOptions::new(root.join("daemon.sock"))
            .with_startup_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(10));
        let mut child = Command::new("true").spawn().expect("spawn true");
        let error = wait_for_ready(&options, &mut child, &Context::background()).expect_err("times out");
        assert!(matches!(error, LifecycleError::StartupTimeout { timeout_ms: 100, .. }));
    }

    #[test]
    fn cancelled_wait_stops_polling() {
        let (_dir, root) = temp_dir();
        let options = DaemonOptions::new(root.join("daemon.sock"));
        let mut child = Command::new("true").spawn().expect("spawn true");
        let context = Context::background();
        context.cancel();
        let error = wait_for_ready(&options, &mut child, &context).expect_err("cancelled");
        assert!(matches!(error, LifecycleError::Context(_)));
        let _ = child.wait();
    }
}
