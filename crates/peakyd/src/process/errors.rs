//! Failures between loading configuration and the end of the shutdown drain.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use ortho_config::OrthoError;
use peaky_config::RuntimePathsError;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::daemon::DaemonError;
use crate::transport::ListenerError;

use super::daemonizer::DaemonizeError;
use super::shutdown::ShutdownError;

/// Why `peakyd` could not start, or did not stop cleanly.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The lock and PID locations could not be derived from the socket.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// The lock file beside the socket could not be created.
    #[error("failed to take daemon lock '{path}': {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The lock is held and the PID file names a live process.
    #[error("peakyd is already running with pid {pid} (recorded in '{pid_file}')")]
    AlreadyRunning {
        /// PID read from the PID file.
        pid: u32,
        /// PID file naming the owner.
        pid_file: PathBuf,
    },
    /// Something answers on the socket although this daemon holds the lock.
    #[error("another process is serving '{socket}'")]
    SocketTaken {
        /// Socket that could not be taken over.
        socket: Utf8PathBuf,
    },
    /// A lock or PID file left by a dead daemon could not be removed.
    #[error("failed to clear stale '{path}': {source}")]
    StaleFile {
        /// File that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The PID file could not be written.
    #[error("failed to record pid in '{path}': {source}")]
    PidFile {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Checking whether the recorded owner is alive failed.
    #[error("failed to check whether pid {pid} is alive: {source}")]
    OwnerCheck {
        /// PID read from the PID file.
        pid: u32,
        /// Error returned by the signal probe.
        #[source]
        source: Errno,
    },
    /// Detaching from the controlling terminal failed.
    #[error("failed to detach from the terminal: {source}")]
    Detach {
        /// Underlying daemonisation error.
        #[from]
        source: DaemonizeError,
    },
    /// Waiting for a stop signal failed.
    #[error("failed to wait for a stop signal: {source}")]
    SignalWait {
        /// Underlying signal error.
        #[from]
        source: ShutdownError,
    },
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[from]
        source: BootstrapError,
    },
    /// The listener or event loop could not be started.
    #[error("failed to start serving: {source}")]
    Serve {
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },
    /// The accept loop failed while the daemon drained its clients.
    #[error("daemon shutdown failed: {source}")]
    Teardown {
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },
}

impl LaunchError {
    /// Classifies a failure from [`crate::daemon::Daemon::start`]. A live peer
    /// on the socket becomes [`LaunchError::SocketTaken`].
    pub(crate) fn serving(source: DaemonError) -> Self {
        match source {
            DaemonError::Listener(ListenerError::InUse { path }) => Self::SocketTaken {
                socket: Utf8PathBuf::from(path),
            },
            source => Self::Serve { source },
        }
    }
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}
