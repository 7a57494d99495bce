//! Error types raised by client connections.

use std::io;

use camino::Utf8PathBuf;
use peaky_protocol::{CodecError, ContextError, FrameError, Op};
use thiserror::Error;

/// Errors raised while dialling the daemon or making a call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon socket could not be reached.
    #[error("failed to connect to daemon at {socket}: {source}")]
    Connect {
        /// Socket that was dialled.
        socket: Utf8PathBuf,
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
    /// The connection is closed or failed; reconnect and retry.
    #[error("daemon connection unavailable")]
    Unavailable,
    /// The daemon answered the call with an error.
    #[error("{op} failed: {message}")]
    Remote {
        /// Operation that failed.
        op: Op,
        /// Error text reported by the daemon.
        message: String,
    },
    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,
    /// The call's deadline passed before a response arrived.
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    /// A request or response payload could not be (de)serialised.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Writing the request failed.
    #[error("failed to send request: {0}")]
    Frame(#[source] FrameError),
    /// A client thread could not be started.
    #[error("failed to start client thread: {source}")]
    Spawn {
        /// Operating system reason.
        #[source]
        source: io::Error,
    },
    /// The `hello` handshake failed.
    #[error("handshake with daemon failed: {source}")]
    Handshake {
        /// Failure raised by the handshake call.
        #[source]
        source: Box<ClientError>,
    },
}

impl From<ContextError> for ClientError {
    fn from(error: ContextError) -> Self {
        match error {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::Context(reason) => reason.into(),
            FrameError::Closed => Self::Unavailable,
            other => Self::Frame(other),
        }
    }
}

impl ClientError {
    /// Returns `true` when the daemon is absent or the connection is gone,
    /// meaning the caller should reconnect (or start the daemon) and retry.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Connect { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::AddrNotAvailable
            ),
            Self::Unavailable | Self::Frame(_) => true,
            Self::Handshake { source } => source.is_unavailable(),
            _ => false,
        }
    }

    /// Returns `true` when the failure was a timeout rather than a refusal,
    /// which suggests a daemon is present but not answering.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Connect { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            Self::DeadlineExceeded => true,
            Self::Handshake { source } => source.is_timeout(),
            _ => false,
        }
    }
}
