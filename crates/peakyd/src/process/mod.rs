//! Process supervision: daemonisation, singleton lock, PID file and the
//! shutdown wait.

use std::time::Duration;

pub(crate) mod daemonizer;
mod errors;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use errors::LaunchError;
pub use launch::{LaunchMode, run_daemon};
pub(crate) use launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// Setting this variable keeps the daemon attached to the terminal.
pub const FOREGROUND_ENV_VAR: &str = "PEAKYPANES_FOREGROUND";
