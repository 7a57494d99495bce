//! Daemon termination and shutdown waiting.

use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use peaky_protocol::Context;

use super::error::LifecycleError;
use super::monitoring::millis;

/// Sends SIGTERM to `pid`.
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidPid`] for PIDs that would address a
/// process group and [`LifecycleError::SignalFailed`] when the kernel
/// rejects the signal.
pub(super) fn signal_daemon(pid: u32) -> Result<(), LifecycleError> {
    if pid == 0 {
        return Err(LifecycleError::InvalidPid {
            pid,
            reason: "pid 0 addresses the caller's process group",
        });
    }
    let raw = i32::try_from(pid).map_err(|_| LifecycleError::InvalidPid {
        pid,
        reason: "pid exceeds the platform range",
    })?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|source| LifecycleError::SignalFailed { pid, source })
}

/// Waits for the daemon to remove its socket file.
pub(super) fn wait_for_shutdown(
    socket: &Utf8Path,
    timeout: Duration,
    poll_interval: Duration,
    context: &Context,
) -> Result<(), LifecycleError> {
    let deadline = Instant::now() + timeout;
    loop {
        context.check()?;
        if !socket.exists() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(LifecycleError::ShutdownTimeout {
                socket: socket.to_owned(),
                timeout_ms: millis(timeout),
            });
        }
        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use nix::errno::Errno;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn signal_daemon_fails_for_nonexistent_pid() {
        // Above the default pid_max on every Linux configuration.
        let result = signal_daemon(99_999_999);
        let Err(LifecycleError::SignalFailed { pid, source }) = result else {
            panic!("expected SignalFailed, got {result:?}");
        };
        assert_eq!(pid, 99_999_999);
        assert_eq!(source, Errno::ESRCH);
    }

    #[rstest]
    #[case::pid_zero(0, "process group")]
    #[case::pid_exceeds_i32_max(2_147_483_648, "exceeds")]
    fn signal_daemon_rejects_invalid_pid(#[case] invalid_pid: u32, #[case] expected_reason: &str) {
        let result = signal_daemon(invalid_pid);
        let Err(LifecycleError::InvalidPid { pid, reason }) = result else {
            panic!("expected InvalidPid, got {result:?}");
        };
        assert_eq!(pid, invalid_pid);
        assert!(reason.contains(expected_reason), "unexpected reason '{reason}'");
    }

    #[test]
    fn shutdown_completes_once_the_socket_is_gone() {
        let dir = TempDir::new().expect("temp dir");
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("daemon.sock")).expect("utf8 path");
        fs::write(&socket, "").expect("write socket stand-in");
        let remover = {
            let socket = socket.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                fs::remove_file(&socket).expect("remove socket");
            })
        };
        wait_for_shutdown(
            &socket,
            Duration::from_secs(2),
            Duration::from_millis(5),
            &Context::background(),
        )
        .expect("shutdown observed");
        remover.join().expect("remover thread");
    }

    #[test]
    fn lingering_socket_times_out() {
        let dir = TempDir::new().expect("temp dir");
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("daemon.sock")).expect("utf8 path");
        fs::write(&socket, "").expect("write socket stand-in");
        let error = wait_for_shutdown(
            &socket,
            Duration::from_millis(40),
            Duration::from_millis(5),
            &Context::background(),
        )
        .expect_err("times out");
        assert!(matches!(error, LifecycleError::ShutdownTimeout { timeout_ms: 40, .. }));
    }
}
