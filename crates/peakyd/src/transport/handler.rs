//! Connection handling abstraction for the daemon listener.

use std::os::unix::net::UnixStream;

/// Handles accepted socket connections.
///
/// `handle` runs on a thread of its own and owns the stream until it
/// returns. Implementations should avoid panicking.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection to completion.
    fn handle(&self, stream: UnixStream);
}
