//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use peaky_config::Config;
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader placing the socket inside a private temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    runtime: Arc<TempDir>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary runtime directory");
        Self {
            runtime: Arc::new(dir),
        }
    }

    /// Directory holding the socket, lock and PID files.
    pub fn runtime_dir(&self) -> PathBuf {
        self.runtime.path().join("run")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir().join("daemon.sock")
    }

    fn config(&self) -> Config {
        let socket = Utf8PathBuf::from_path_buf(self.socket_path())
            .expect("temporary socket path was not valid UTF-8");
        Config::for_socket(socket)
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that fails by passing an unparsable log format flag.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("peakyd"),
            OsString::from("--log-format"),
            OsString::from("sparkles"),
        ])
    }
}
