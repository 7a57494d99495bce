//! The peakypanes session daemon.
//!
//! `peakyd` owns the terminal sessions of one user and serves them to any
//! number of clients over a private Unix socket. Each connection carries
//! length-prefixed envelopes defined by [`peaky_protocol`]: requests are
//! answered through a static operation table, pane renders are coalesced per
//! pane and rendered by a small worker pool, and daemon events are fanned out
//! to every connection through a deduplicating queue.
//!
//! The session engine itself sits behind the [`manager::SessionManager`] and
//! [`manager::PaneWindow`] traits. [`manager::MemoryManager`] is the
//! in-process engine the binary ships with.
//!
//! ## Lifecycle
//!
//! [`run_daemon`] loads configuration, takes the singleton lock, optionally
//! daemonises, writes the PID file, installs telemetry and starts a
//! [`Daemon`]. It then waits for a termination signal and tears everything
//! down, removing the socket, lock and PID files on the way out.

mod bootstrap;
pub mod connection;
mod daemon;
pub mod dispatch;
pub mod eventlog;
mod health;
pub mod manager;
pub mod pane_view;
mod process;
pub mod relay;
pub mod state;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use daemon::{Daemon, DaemonError};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    DaemonizeError, Daemonizer, FOREGROUND_ENV_VAR, LaunchError, LaunchMode, ShutdownError,
    ShutdownSignal, SystemDaemonizer, SystemShutdownSignal, run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
