//! Error types for daemon lifecycle operations.

use std::ffi::OsString;
use std::io;
use std::num::ParseIntError;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use peaky_protocol::ContextError;
use thiserror::Error;

use crate::errors::ClientError;

/// Errors raised while starting, probing or stopping the daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to probe daemon socket {socket}: {source}")]
    Probe {
        socket: Utf8PathBuf,
        #[source]
        source: ClientError,
    },
    #[error("failed to spawn daemon binary '{binary:?}': {source}")]
    LaunchDaemon {
        binary: OsString,
        #[source]
        source: io::Error,
    },
    #[error("daemon exited before it answered (status: {exit_status:?})")]
    StartupFailed { exit_status: Option<i32> },
    #[error("daemon did not answer on {socket} within {timeout_ms} ms")]
    StartupTimeout { socket: Utf8PathBuf, timeout_ms: u64 },
    #[error("failed to monitor daemon launch: {source}")]
    MonitorChild {
        #[source]
        source: io::Error,
    },
    #[error("failed to read pid file {path}: {source}")]
    ReadPid {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse pid file {path}: {source}")]
    ParsePid {
        path: Utf8PathBuf,
        #[source]
        source: ParseIntError,
    },
    #[error("daemon answers on {socket} but pid file {path} is missing or empty")]
    MissingPid { path: Utf8PathBuf, socket: Utf8PathBuf },
    #[error("invalid daemon pid {pid}: {reason}")]
    InvalidPid { pid: u32, reason: &'static str },
    #[error("failed to signal daemon pid {pid}: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: Errno,
    },
    #[error("daemon socket {socket} still present after {timeout_ms} ms")]
    ShutdownTimeout { socket: Utf8PathBuf, timeout_ms: u64 },
    #[error(transparent)]
    Context(#[from] ContextError),
}
