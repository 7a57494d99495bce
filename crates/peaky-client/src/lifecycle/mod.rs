//! Daemon lifecycle helpers for callers.
//!
//! - [`error`] captures the failures surfaced to callers.
//! - [`spawning`] resolves and launches the daemon binary.
//! - [`monitoring`] polls for readiness and reads the PID file.
//! - [`shutdown`] signals the daemon and waits for its socket to go away.
//!
//! [`ensure_daemon_running`] probes the socket first and only launches a
//! daemon when nothing answers. [`stop_daemon`] is the inverse: it reads
//! the PID file of an answering daemon, sends SIGTERM and waits for the
//! socket file to disappear.

mod error;
mod monitoring;
mod shutdown;
mod spawning;

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use peaky_config::{Config, default_pid_path, default_socket_path};
use peaky_protocol::Context;
use tracing::{debug, info};

pub use error::LifecycleError;
pub use spawning::DAEMON_BIN_ENV;

use crate::client::Client;
use crate::errors::ClientError;

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Interval between readiness and shutdown polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(150);
/// How long a freshly spawned daemon has to answer.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a signalled daemon has to remove its socket.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the daemon lives and how to launch it.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    socket: Utf8PathBuf,
    pid_file: Utf8PathBuf,
    binary: Option<OsString>,
    version: String,
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    poll_interval: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl DaemonOptions {
    /// Options for the daemon on `socket`, with the PID file beside it.
    #[must_use]
    pub fn new(socket: impl Into<Utf8PathBuf>) -> Self {
        let socket = socket.into();
        Self {
            pid_file: default_pid_path(&socket),
            socket,
            binary: None,
            version: env!("CARGO_PKG_VERSION").to_owned(),
            startup_timeout: STARTUP_TIMEOUT,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Options derived from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.daemon_socket()).with_pid_file(config.pid_file())
    }

    /// Overrides the PID file location.
    #[must_use]
    pub fn with_pid_file(mut self, pid_file: impl Into<Utf8PathBuf>) -> Self {
        self.pid_file = pid_file.into();
        self
    }

    /// Launches `binary` instead of resolving `PEAKYD_BIN` or `peakyd`.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<OsString>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Version announced in the handshake.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Overrides how long a spawned daemon has to answer.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Overrides how long a signalled daemon has to exit.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Overrides the polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Daemon socket.
    #[must_use]
    pub fn socket(&self) -> &Utf8PathBuf {
        &self.socket
    }

    /// Daemon PID file.
    #[must_use]
    pub fn pid_file(&self) -> &Utf8PathBuf {
        &self.pid_file
    }
}

/// Dials the daemon and performs the handshake.
///
/// # Errors
///
/// Returns the [`ClientError`] from the dial or the handshake.
pub fn probe_daemon(options: &DaemonOptions, context: &Context) -> Result<Client, ClientError> {
    Client::dial(&options.socket, &options.version, context)
}

/// Returns a connected client, launching the daemon first when nothing
/// answers on the socket.
///
/// # Errors
///
/// A probe that times out is reported as [`LifecycleError::Probe`] rather
/// than treated as an absent daemon. Launch failures surface as
/// [`LifecycleError::LaunchDaemon`], [`LifecycleError::StartupFailed`] or
/// [`LifecycleError::StartupTimeout`].
pub fn ensure_daemon_running(options: &DaemonOptions, context: &Context) -> Result<Client, LifecycleError> {
    match probe_daemon(options, context) {
        Ok(client) => return Ok(client),
        Err(source) if source.is_timeout() => {
            return Err(LifecycleError::Probe {
                socket: options.socket.clone(),
                source,
            });
        }
        Err(error) => debug!(target: LIFECYCLE_TARGET, %error, "daemon not answering; starting one"),
    }
    context.check()?;
    let mut child = spawning::spawn_daemon(&options.socket, &options.pid_file, options.binary.as_deref())?;
    let client = monitoring::wait_for_ready(options, &mut child, context)?;
    info!(
        target: LIFECYCLE_TARGET,
        socket = %options.socket,
        pid = client.daemon().pid,
        "daemon started"
    );
    Ok(client)
}

/// Connects to the daemon named by the default socket and PID paths,
/// starting it when needed.
///
/// # Errors
///
/// See [`ensure_daemon_running`].
pub fn connect_default(version: &str, context: &Context) -> Result<Client, LifecycleError> {
    ensure_daemon_running(&DaemonOptions::default().with_version(version), context)
}

/// Stops the daemon, returning `false` when none was running.
///
/// # Errors
///
/// Returns [`LifecycleError::MissingPid`] when a daemon answers but its PID
/// file is absent, the PID read or signal failures, and
/// [`LifecycleError::ShutdownTimeout`] when the socket outlives the timeout.
pub fn stop_daemon(options: &DaemonOptions, context: &Context) -> Result<bool, LifecycleError> {
    let client = match probe_daemon(options, context) {
        Ok(client) => client,
        Err(error) => {
            info!(target: LIFECYCLE_TARGET, socket = %options.socket, %error, "daemon not running");
            return Ok(false);
        }
    };
    client.close();
    let pid = monitoring::read_pid(&options.pid_file)?.ok_or_else(|| LifecycleError::MissingPid {
        path: options.pid_file.clone(),
        socket: options.socket.clone(),
    })?;
    shutdown::signal_daemon(pid)?;
    shutdown::wait_for_shutdown(
        &options.socket,
        options.shutdown_timeout,
        options.poll_interval,
        context,
    )?;
    info!(target: LIFECYCLE_TARGET, pid, "daemon stopped");
    Ok(true)
}
