//! Unix socket listener for the daemon.
//!
//! The listener binds the daemon's private socket, replacing a stale socket
//! file left by a dead daemon, and accepts connections on a background
//! thread. Each accepted stream is handed to a [`ConnectionHandler`] on its
//! own thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::ConnectionHandler;
pub use self::listener::{ListenerHandle, SOCKET_MODE, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
