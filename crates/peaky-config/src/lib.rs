//! Shared configuration for the peakypanes daemon and its clients.
//!
//! [`Config`] layers built-in defaults, an optional configuration file,
//! `PEAKYPANES_*` environment variables and command-line flags through
//! `ortho_config`. The helpers in this crate also derive the runtime paths
//! both sides agree on and prepare the socket directory before binding.

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod runtime;
mod socket;

pub use defaults::{
    DEFAULT_LOG_FILTER, PID_FILE_ENV, PID_FILE_NAME, RUNTIME_NAMESPACE, SOCKET_ENV,
    SOCKET_FILE_NAME, default_log_filter, default_log_filter_string, default_log_format,
    default_pid_path, default_runtime_directory, default_socket_path,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{LOCK_FILE_NAME, RuntimePaths, RuntimePathsError};
pub use socket::{SOCKET_DIRECTORY_MODE, SocketPreparationError, prepare_socket_directory};

/// Command-line flags understood by the configuration loader.
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--daemon-socket",
    "--pid-file",
    "--log-filter",
    "--log-format",
];

/// Layered daemon and client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PEAKYPANES")]
pub struct Config {
    /// Path of the daemon's Unix domain socket.
    #[ortho_config(default = default_socket_path())]
    pub daemon_socket: Utf8PathBuf,
    /// Explicit PID file location; defaults to a file beside the socket.
    #[serde(default)]
    pub pid_file: Option<Utf8PathBuf>,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_path(),
            pid_file: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Socket the daemon binds and clients dial.
    #[must_use]
    pub fn daemon_socket(&self) -> &Utf8Path {
        self.daemon_socket.as_path()
    }

    /// PID file path: the explicit setting, else the environment override,
    /// else `daemon.pid` beside the socket.
    #[must_use]
    pub fn pid_file(&self) -> Utf8PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| default_pid_path(self.daemon_socket()))
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Configuration bound to `socket` with every other setting defaulted.
    #[must_use]
    pub fn for_socket(socket: impl Into<Utf8PathBuf>) -> Self {
        Self {
            daemon_socket: socket.into(),
            ..Self::default()
        }
    }
}
