//! Derives runtime artefact paths shared by the client helpers and daemon.
//!
//! The runtime directory is the socket's parent. It houses the singleton lock
//! and, unless overridden, the PID file. Both sides must agree on the layout
//! so lifecycle helpers can find the files written by the daemon.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// File name of the singleton lock inside the runtime directory.
pub const LOCK_FILE_NAME: &str = "daemon.lock";

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    socket_path: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the shared configuration, creating the
    /// runtime directory when needed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimePathsError`] when the socket has no parent directory
    /// or the directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let socket = config.daemon_socket();
        let runtime_dir = match socket.parent().filter(|parent| !parent.as_str().is_empty()) {
            Some(parent) => parent.as_std_path().to_path_buf(),
            None => {
                return Err(RuntimePathsError::MissingSocketParent {
                    path: socket.to_string(),
                });
            }
        };
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            socket_path: socket.as_std_path().to_path_buf(),
            lock_path: runtime_dir.join(LOCK_FILE_NAME),
            pid_path: config.pid_file().into_std_path_buf(),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the daemon socket.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        self.socket_path.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The socket path lacked a parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Offending socket path.
        path: String,
    },
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}
