//! Wire protocol shared by the peakypanes session daemon and its clients.
//!
//! Clients and the daemon exchange [`Envelope`]s over a private local socket.
//! An envelope is a request, a response correlated with a request by ID, or
//! an asynchronous event. Payloads are opaque bytes produced by a
//! [`PayloadCodec`]; the wire codec is JSON.
//!
//! # Core types
//!
//! - [`Envelope`], [`Op`] and [`EventType`]: the message unit and its catalogs
//! - [`FrameReader`] and [`write_envelope`]: length-prefixed framing
//! - [`Event`] and [`EventQueue`]: event shape and key-deduplicating buffer
//! - [`Context`]: cancellable, deadline-bound unit of work
//! - [`payloads`]: one request/response type per operation
//!
//! # Example
//!
//! ```
//! use peaky_protocol::{Envelope, Op, decode_payload, encode_payload};
//! use peaky_protocol::payloads::HelloRequest;
//!
//! let hello = HelloRequest { version: "1".to_owned(), ..HelloRequest::default() };
//! let request = Envelope::request(1, Op::Hello, encode_payload(&hello)?);
//! let body = request.encode_body()?;
//! let decoded = Envelope::decode_body(&body)?;
//! let payload: HelloRequest = decode_payload(&decoded.payload)?;
//! assert_eq!(payload, hello);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod codec;
mod context;
mod envelope;
mod event;
mod frame;
pub mod payloads;
#[cfg(unix)]
pub mod transport;

pub use codec::{CodecError, JsonCodec, PayloadCodec, decode_payload, encode_payload};
pub use context::{CancelHandle, Context, ContextError};
pub use envelope::{Envelope, EnvelopeError, EnvelopeKind, EventType, Op};
pub use event::{Event, EventKey, EventQueue, EventSubject, PushOutcome};
pub use frame::{
    DIAL_TIMEOUT, FrameError, FrameReader, MAX_ENVELOPE_BYTES, OPERATION_TIMEOUT,
    READ_IDLE_TIMEOUT, WRITE_TIMEOUT, effective_write_timeout, encode_frame, write_envelope,
};

/// Protocol version exchanged in the `hello` handshake.
pub const PROTOCOL_VERSION: &str = "1";
