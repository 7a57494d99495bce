//! Envelope reading and writing over Unix domain sockets.
//!
//! A connection is split into an [`EnvelopeReader`] and an [`EnvelopeWriter`]
//! over clones of the same socket so reads and writes can run on separate
//! threads.

use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

use crate::context::Context;
use crate::envelope::Envelope;
use crate::frame::{FrameError, FrameReader, READ_IDLE_TIMEOUT, effective_write_timeout};

/// Splits `stream` into a reader with the idle deadline applied and a writer.
///
/// # Errors
///
/// Returns the I/O error raised while cloning the socket or setting its read
/// timeout.
pub fn split(stream: UnixStream) -> io::Result<(EnvelopeReader, EnvelopeWriter)> {
    let write_half = stream.try_clone()?;
    stream.set_read_timeout(Some(READ_IDLE_TIMEOUT))?;
    Ok((
        EnvelopeReader {
            stream,
            frames: FrameReader::new(),
        },
        EnvelopeWriter { stream: write_half },
    ))
}

/// Read half of a framed connection.
#[derive(Debug)]
pub struct EnvelopeReader {
    stream: UnixStream,
    frames: FrameReader,
}

impl EnvelopeReader {
    /// Reads one envelope, blocking up to the idle deadline.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`]; idle timeouts satisfy
    /// [`FrameError::is_timeout`] and may be retried.
    pub fn read(&mut self) -> Result<Envelope, FrameError> {
        self.frames.read_envelope(&mut self.stream)
    }
}

/// Write half of a framed connection.
#[derive(Debug)]
pub struct EnvelopeWriter {
    stream: UnixStream,
}

impl EnvelopeWriter {
    /// Writes one envelope bounded by the default write timeout and the
    /// context's deadline.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Context`] without writing when the context is
    /// finished, otherwise any encoding or I/O error.
    pub fn write(&mut self, envelope: &Envelope, context: &Context) -> Result<(), FrameError> {
        let timeout = effective_write_timeout(context)?;
        self.stream.set_write_timeout(Some(timeout))?;
        crate::frame::write_envelope(&mut self.stream, envelope)
    }

    /// Returns a handle that can shut the socket down from another thread.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while cloning the socket.
    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            stream: self.stream.try_clone()?,
        })
    }
}

/// Shuts a framed connection down in both directions.
#[derive(Debug)]
pub struct ShutdownHandle {
    stream: UnixStream,
}

impl ShutdownHandle {
    /// Shuts the socket down; blocked reads and writes return promptly.
    pub fn shutdown(&self) {
        if let Err(error) = self.stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            tracing::debug!(
                target: concat!(env!("CARGO_PKG_NAME"), "::transport"),
                error = %error,
                "socket shutdown failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::envelope::{EnvelopeKind, Op};

    #[test]
    fn envelopes_cross_a_socket_pair() {
        let (left, right) = UnixStream::pair().expect("pair");
        let (_left_reader, mut left_writer) = split(left).expect("split left");
        let (mut right_reader, _right_writer) = split(right).expect("split right");
        let request = Envelope::request(3, Op::Hello, Vec::new());
        left_writer
            .write(&request, &Context::background())
            .expect("write");
        let received = right_reader.read().expect("read");
        assert_eq!(received.kind, EnvelopeKind::Request);
        assert_eq!(received.id, 3);
    }

    #[test]
    fn shutdown_unblocks_the_reader() {
        let (left, _right) = UnixStream::pair().expect("pair");
        let (mut reader, writer) = split(left).expect("split");
        let handle = writer.shutdown_handle().expect("handle");
        let worker = std::thread::spawn(move || reader.read());
        std::thread::sleep(Duration::from_millis(20));
        handle.shutdown();
        let outcome = worker.join().expect("join");
        assert!(matches!(outcome, Err(FrameError::Closed)));
    }
}
