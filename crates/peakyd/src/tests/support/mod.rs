//! Shared doubles for the behavioural suites.

mod config_loader;
mod daemon_world;
mod reporter;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use daemon_world::{DaemonWorld, TestClient};
pub use reporter::{HealthEvent, RecordingHealthReporter};
