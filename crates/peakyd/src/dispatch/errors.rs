//! Error types for request dispatch failures.
//!
//! Every handler failure is one of these variants. The router renders the
//! `Display` text into the response's error field, so messages are written
//! for the client that sent the request.

use peaky_protocol::CodecError;
use thiserror::Error;

use crate::manager::ManagerError;
use crate::pane_view::PaneViewError;
use crate::relay::RelayError;

/// Errors surfaced while handling one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request payload could not be decoded.
    #[error("invalid payload: {0}")]
    Payload(#[source] CodecError),

    /// The envelope named an operation outside the catalog.
    #[error("unknown op \"{op}\"")]
    UnknownOperation { op: String },

    /// A request field failed validation.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// The request named a pane that does not exist.
    #[error("pane \"{pane_id}\" not found")]
    PaneNotFound { pane_id: String },

    /// The session engine rejected the operation.
    #[error(transparent)]
    Manager(#[from] ManagerError),

    /// The operation is in the catalog but has no handler.
    #[error("{operation} is not supported")]
    Unsupported { operation: String },

    /// A wait pattern is not a valid regular expression.
    #[error("invalid regex: {0}")]
    Pattern(#[source] regex::Error),

    /// The pane view could not be produced.
    #[error(transparent)]
    PaneView(#[from] PaneViewError),

    /// Relay management failed.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The daemon failed to build its response.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<CodecError> for DispatchError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Decode { .. } => Self::Payload(error),
            CodecError::Encode { .. } => Self::internal(error.to_string()),
        }
    }
}

impl DispatchError {
    /// Creates an unknown operation error.
    pub fn unknown_operation(op: impl Into<String>) -> Self {
        Self::UnknownOperation { op: op.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a pane-not-found error.
    pub fn pane_not_found(pane_id: impl Into<String>) -> Self {
        Self::PaneNotFound {
            pane_id: pane_id.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for failures caused by the request itself rather than
    /// by daemon state.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Payload(_)
                | Self::UnknownOperation { .. }
                | Self::InvalidArgument { .. }
                | Self::Pattern(_)
        )
    }
}
