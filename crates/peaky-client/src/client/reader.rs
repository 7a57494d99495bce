use std::sync::atomic::Ordering;

use peaky_protocol::transport::EnvelopeReader;
use peaky_protocol::{EnvelopeKind, Event, FrameError, PushOutcome, decode_payload};
use tracing::{debug, trace};

use super::{CLIENT_TARGET, Shared};

/// Demultiplexes incoming envelopes until the connection ends, then closes
/// the shared state so waiting callers fail promptly.
pub(super) fn read_loop(mut reader: EnvelopeReader, shared: &Shared) {
    loop {
        let envelope = match reader.read() {
            Ok(envelope) => envelope,
            Err(error) if error.is_timeout() => {
                if shared.closed.load(Ordering::SeqCst) {
                    break;
                }
                continue;
            }
            Err(FrameError::Closed) => break,
            Err(error) => {
                debug!(target: CLIENT_TARGET, %error, "client read failed");
                break;
            }
        };
        match envelope.kind {
            EnvelopeKind::Response => {
                let id = envelope.id;
                if !shared.pending.resolve(envelope) {
                    trace!(target: CLIENT_TARGET, id, "ignoring response without a waiting call");
                }
            }
            EnvelopeKind::Event => match decode_payload::<Event>(&envelope.payload) {
                Ok(event) => {
                    if shared.events.push(event) == PushOutcome::Dropped {
                        debug!(target: CLIENT_TARGET, "event queue full, dropping event");
                    }
                }
                Err(error) => debug!(target: CLIENT_TARGET, %error, "undecodable event"),
            },
            EnvelopeKind::Request => {
                trace!(target: CLIENT_TARGET, op = %envelope.op, "ignoring request from daemon");
            }
        }
    }
    shared.close();
}
