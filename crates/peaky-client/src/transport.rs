//! Socket transport helpers for the client.
//!
//! Dialling goes through `socket2` so the connect itself is bounded by
//! [`DIAL_TIMEOUT`] rather than blocking on a wedged listener.

use std::io;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use camino::Utf8Path;
use peaky_protocol::{Context, DIAL_TIMEOUT};
use socket2::{Domain, SockAddr, Socket, Type};

use crate::errors::ClientError;

/// Connects to the daemon socket at `path`, bounded by the dial timeout and
/// the context's deadline.
pub(crate) fn connect(path: &Utf8Path, context: &Context) -> Result<UnixStream, ClientError> {
    context.check()?;
    let timeout = dial_timeout(context);
    connect_unix(path, timeout).map_err(|source| ClientError::Connect {
        socket: path.to_owned(),
        source,
    })
}

fn dial_timeout(context: &Context) -> Duration {
    context
        .remaining()
        .map_or(DIAL_TIMEOUT, |remaining| remaining.min(DIAL_TIMEOUT))
        .max(Duration::from_millis(1))
}

fn connect_unix(path: &Utf8Path, timeout: Duration) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path.as_std_path())?;
    socket.connect_timeout(&address, timeout)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixListener;

    use camino::Utf8PathBuf;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    fn connects_to_a_listening_socket() {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("d.sock")).expect("utf8 path");
        let _listener = UnixListener::bind(&path).expect("bind");
        connect(&path, &Context::background()).expect("connect");
    }

    #[rstest]
    fn missing_sockets_are_reported_unavailable() {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.sock")).expect("utf8 path");
        let error = connect(&path, &Context::background()).expect_err("nothing listening");
        assert!(error.is_unavailable(), "unexpected error: {error}");
    }

    #[rstest]
    fn a_cancelled_context_does_not_dial() {
        let context = Context::background().child();
        context.cancel();
        let error = connect(Utf8Path::new("/nonexistent.sock"), &context).expect_err("cancelled");
        assert!(matches!(error, ClientError::Cancelled));
    }
}
