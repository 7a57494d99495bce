//! Supervises daemon launch sequencing and runtime orchestration.

use std::env;
use std::sync::Arc;

use peaky_config::RuntimePaths;
use tracing::info;

use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::daemon::Daemon;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::manager::{MemoryManager, SessionManager};

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::ProcessGuard;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; used for debugging and tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators controlling the daemon lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
}

/// Services the daemon runtime is built from. `manager` runs after any
/// fork so the session engine is created in the final process.
pub(crate) struct ServiceDeps<L, M> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) manager: M,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, D, S, M> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L, M>,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] for any failure between loading configuration
/// and completing shutdown.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::detect(),
            daemonizer: SystemDaemonizer::new(),
            shutdown: SystemShutdownSignal::new(SHUTDOWN_TIMEOUT),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            manager: || Arc::new(MemoryManager::new()) as Arc<dyn SessionManager>,
        },
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, D, S, M>(plan: LaunchPlan<L, D, S, M>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
    M: FnOnce() -> Arc<dyn SessionManager>,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        shutdown,
    } = process;
    let ServiceDeps {
        loader,
        reporter,
        manager,
    } = services;

    info!(target: PROCESS_TARGET, ?mode, "starting daemon runtime");
    let config = loader.load()?;
    let guard = ProcessGuard::acquire(RuntimePaths::from_config(&config)?)?;
    if mode == LaunchMode::Background {
        daemonizer.daemonize(guard.paths())?;
    }
    guard.write_pid(std::process::id())?;

    let config = bootstrap_with(&StaticConfigLoader::new(config), reporter.as_ref())?.into_config();
    let daemon = Daemon::start(config.daemon_socket(), manager(), env!("CARGO_PKG_VERSION"))
        .map_err(LaunchError::serving)?;
    reporter.listening(daemon.socket());

    let waited = shutdown.wait();
    reporter.stopping(
        daemon.state().connections().len(),
        daemon.state().relays().len(),
    );
    daemon
        .stop()
        .map_err(|source| LaunchError::Teardown { source })?;
    waited?;
    drop(guard);
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
