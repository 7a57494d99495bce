//! Failures reported by the session engine.

use peaky_protocol::ContextError;
use thiserror::Error;

/// Errors raised by [`super::SessionManager`] and [`super::PaneWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// No session has the given name.
    #[error("session \"{name}\" not found")]
    SessionNotFound {
        /// Requested session name.
        name: String,
    },
    /// No pane has the given identifier.
    #[error("pane \"{pane_id}\" not found")]
    PaneNotFound {
        /// Requested pane identifier.
        pane_id: String,
    },
    /// The session has no pane at the given index.
    #[error("pane {index} not found in session \"{session}\"")]
    PaneIndexNotFound {
        /// Session searched.
        session: String,
        /// Requested pane index.
        index: String,
    },
    /// A session with the name already exists.
    #[error("session \"{name}\" already exists")]
    SessionExists {
        /// Conflicting session name.
        name: String,
    },
    /// An argument was rejected.
    #[error("{message}")]
    InvalidArgument {
        /// Human-readable reason.
        message: String,
    },
    /// The engine cannot perform the operation.
    #[error("{operation} is not supported")]
    Unsupported {
        /// Operation name.
        operation: String,
    },
    /// The engine has shut down.
    #[error("session manager is closed")]
    Closed,
}

impl ManagerError {
    /// Creates a pane-not-found error.
    pub fn pane_not_found(pane_id: impl Into<String>) -> Self {
        Self::PaneNotFound {
            pane_id: pane_id.into(),
        }
    }

    /// Creates a session-not-found error.
    pub fn session_not_found(name: impl Into<String>) -> Self {
        Self::SessionNotFound { name: name.into() }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Errors raised while rendering a pane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The render was cancelled or ran past its deadline.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The pane's window could not be resized.
    #[error("resize failed: {0}")]
    Resize(#[source] ManagerError),
    /// The engine failed to produce a frame.
    #[error("render failed: {message}")]
    Failed {
        /// Engine-supplied reason.
        message: String,
    },
}

impl RenderError {
    /// Returns `true` for cancellations and missed deadlines, which the
    /// pane-view pipeline recovers from with a cached frame.
    #[must_use]
    pub const fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}
