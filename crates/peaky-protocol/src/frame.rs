//! Length-prefixed envelope framing.
//!
//! Each frame is a 4-byte big-endian body length followed by an envelope body
//! (see [`Envelope::encode_body`]). [`FrameReader`] keeps a partially read
//! frame across read timeouts, so a caller that treats an idle timeout as
//! "try again" never loses its place in the stream.

use std::io::{self, Read, Write};
use std::time::Duration;

use thiserror::Error;

use crate::context::{Context, ContextError};
use crate::envelope::{Envelope, EnvelopeError};

/// Largest envelope body accepted in either direction.
pub const MAX_ENVELOPE_BYTES: usize = 64 << 20;
/// Rolling idle deadline applied to envelope reads.
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default bound on a single envelope write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on a request/response round trip.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on establishing a client connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

const HEADER_BYTES: usize = 4;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The underlying stream failed or timed out.
    #[error("frame i/o failed: {0}")]
    Io(#[from] io::Error),
    /// A frame exceeded [`MAX_ENVELOPE_BYTES`].
    #[error("envelope of {size} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Declared or encoded body size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The frame body is not a valid envelope.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The peer closed the stream on a frame boundary.
    #[error("connection closed")]
    Closed,
    /// The caller's context ended before the write started.
    #[error("write aborted: {0}")]
    Context(#[source] ContextError),
}

impl FrameError {
    /// Returns `true` for read failures that only mean "no data yet".
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(error)
                if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        )
    }
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct FrameReader {
    header: [u8; HEADER_BYTES],
    header_filled: usize,
    body: Option<Vec<u8>>,
    body_filled: usize,
}

impl FrameReader {
    /// Creates a reader positioned on a frame boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when part of a frame has been consumed.
    #[must_use]
    pub const fn is_mid_frame(&self) -> bool {
        self.header_filled > 0
    }

    /// Reads the next complete envelope from `reader`.
    ///
    /// A timeout leaves the partial frame buffered; call again to resume.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Closed`] on a clean end of stream,
    /// [`FrameError::TooLarge`] for an oversized length prefix, an I/O error
    /// (check [`FrameError::is_timeout`]) or an envelope decode error. The
    /// frame is fully consumed before a decode error is reported.
    #[expect(clippy::big_endian_bytes, reason = "frame lengths are big-endian on the wire")]
    pub fn read_envelope<R: Read>(&mut self, reader: &mut R) -> Result<Envelope, FrameError> {
        if self.header_filled < HEADER_BYTES {
            let at_boundary = self.header_filled == 0;
            fill(reader, &mut self.header, &mut self.header_filled, at_boundary)?;
        }
        let mut body = match self.body.take() {
            Some(body) => body,
            None => {
                let size = u32::from_be_bytes(self.header) as usize;
                if size > MAX_ENVELOPE_BYTES {
                    self.reset();
                    return Err(FrameError::TooLarge {
                        size,
                        max: MAX_ENVELOPE_BYTES,
                    });
                }
                vec![0; size]
            }
        };
        let filled = fill(reader, &mut body, &mut self.body_filled, false);
        if let Err(error) = filled {
            self.body = Some(body);
            return Err(error);
        }
        self.reset();
        Ok(Envelope::decode_body(&body)?)
    }

    fn reset(&mut self) {
        self.header_filled = 0;
        self.body = None;
        self.body_filled = 0;
    }
}

fn fill<R: Read>(
    reader: &mut R,
    buffer: &mut [u8],
    filled: &mut usize,
    at_boundary: bool,
) -> Result<(), FrameError> {
    while let Some(rest) = buffer.get_mut(*filled..).filter(|rest| !rest.is_empty()) {
        match reader.read(rest) {
            Ok(0) if at_boundary && *filled == 0 => return Err(FrameError::Closed),
            Ok(0) => return Err(FrameError::Io(io::ErrorKind::UnexpectedEof.into())),
            Ok(read) => *filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(FrameError::Io(error)),
        }
    }
    Ok(())
}

/// Encodes `envelope` as a complete frame.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] when the body exceeds
/// [`MAX_ENVELOPE_BYTES`], or an envelope error when a field overflows its
/// length prefix.
#[expect(clippy::big_endian_bytes, reason = "frame lengths are big-endian on the wire")]
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, FrameError> {
    let body = envelope.encode_body()?;
    let size = u32::try_from(body.len())
        .ok()
        .filter(|size| *size as usize <= MAX_ENVELOPE_BYTES)
        .ok_or(FrameError::TooLarge {
            size: body.len(),
            max: MAX_ENVELOPE_BYTES,
        })?;
    let mut frame = Vec::with_capacity(HEADER_BYTES + body.len());
    frame.extend_from_slice(&size.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Writes `envelope` as one frame and flushes.
///
/// # Errors
///
/// Returns any encoding error from [`encode_frame`] or the writer's I/O error.
pub fn write_envelope<W: Write>(writer: &mut W, envelope: &Envelope) -> Result<(), FrameError> {
    let frame = encode_frame(envelope)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Write deadline for a caller context: the smaller of [`WRITE_TIMEOUT`] and
/// the context's remaining time.
///
/// # Errors
///
/// Returns [`FrameError::Context`] when the context is already finished.
pub fn effective_write_timeout(context: &Context) -> Result<Duration, FrameError> {
    context.check().map_err(FrameError::Context)?;
    match context.remaining() {
        Some(remaining) if remaining.is_zero() => {
            Err(FrameError::Context(ContextError::DeadlineExceeded))
        }
        Some(remaining) => Ok(remaining.min(WRITE_TIMEOUT)),
        None => Ok(WRITE_TIMEOUT),
    }
}
