//! Singleton lock and PID file owned by the running daemon.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use peaky_config::RuntimePaths;
use tracing::{info, warn};

use super::PROCESS_TARGET;
use super::errors::LaunchError;

const RUNTIME_FILE_MODE: u32 = 0o600;

/// Holds the lock file for the daemon's lifetime; dropping the guard
/// removes the lock and PID files.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
}

impl ProcessGuard {
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self { paths, _lock: lock })
    }

    pub(super) fn write_pid(&self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        let pid_error = |source| LaunchError::PidFile {
            path: path.to_path_buf(),
            source,
        };
        let mut file = private_options()
            .truncate(true)
            .create(true)
            .open(path)
            .map_err(pid_error)?;
        writeln!(file, "{pid}").map_err(pid_error)?;
        file.sync_all().map_err(pid_error)?;
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }

    pub(super) const fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, what) in [
            (self.paths.pid_path(), "pid file"),
            (self.paths.lock_path(), "lock file"),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: PROCESS_TARGET,
                    file = %path.display(),
                    %error,
                    "failed to remove {what}"
                );
            }
        }
    }
}

fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).mode(RUNTIME_FILE_MODE);
    options
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    match private_options().create_new(true).open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: PROCESS_TARGET,
                file = %paths.lock_path().display(),
                "acquired daemon lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(LaunchError::Lock {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path()) {
        if process_alive(pid)? {
            info!(
                target: PROCESS_TARGET,
                pid,
                "refusing to start: existing daemon alive"
            );
            return Err(LaunchError::AlreadyRunning {
                pid,
                pid_file: paths.pid_path().to_path_buf(),
            });
        }
        warn!(
            target: PROCESS_TARGET,
            pid,
            "recorded daemon is gone; cleaning stale files"
        );
    }
    remove_stale(paths.lock_path())?;
    remove_stale(paths.pid_path())?;
    match private_options().create_new(true).open(paths.lock_path()) {
        Ok(file) => Ok(file),
        Err(source) => Err(LaunchError::Lock {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

/// PID recorded in `path`; missing, unreadable or zero PIDs read as none.
pub(crate) fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

fn remove_stale(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::StaleFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn process_alive(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(LaunchError::OwnerCheck { pid, source: errno }),
    }
}
