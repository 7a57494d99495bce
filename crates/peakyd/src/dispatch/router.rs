//! Operation routing for request dispatch.
//!
//! The routing table is built once and never changes. An operation name the
//! catalog does not know is rejected with a failed response naming it.

use std::collections::HashMap;

use peaky_protocol::{Envelope, Op};
use strum::IntoEnumIterator;
use tracing::debug;

use super::errors::DispatchError;
use super::handlers;
use crate::state::DaemonState;

/// Tracing target for dispatch operations.
pub const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Handles one decoded operation and returns its response payload.
pub type Handler = fn(&DaemonState, &[u8]) -> Result<Vec<u8>, DispatchError>;

/// Static table from operation to handler.
#[derive(Debug, Clone)]
pub struct Router {
    handlers: HashMap<Op, Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Builds the routing table covering the whole catalog.
    #[must_use]
    pub fn new() -> Self {
        let handlers = Op::iter()
            .map(|op| (op, handlers::handler_for(op)))
            .collect();
        Self { handlers }
    }

    /// Builds a router from an explicit table.
    #[must_use]
    pub fn with_handlers(handlers: HashMap<Op, Handler>) -> Self {
        Self { handlers }
    }

    /// Returns `true` when `op` has a handler.
    #[must_use]
    pub fn supports(&self, op: Op) -> bool {
        self.handlers.contains_key(&op)
    }

    /// Handles `request`, returning its response envelope.
    ///
    /// The response carries either the handler's payload or the rendered
    /// error; it always echoes the request's ID and operation.
    #[must_use]
    pub fn dispatch(&self, state: &DaemonState, request: &Envelope) -> Envelope {
        let response = Envelope::response_to(request);
        match self.route(state, request) {
            Ok(payload) => response.with_payload(payload),
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    op = %request.op,
                    id = request.id,
                    client_error = error.is_client_error(),
                    error = %error,
                    "request failed"
                );
                response.with_error(error.to_string())
            }
        }
    }

    fn route(&self, state: &DaemonState, request: &Envelope) -> Result<Vec<u8>, DispatchError> {
        let op = request
            .operation()
            .ok_or_else(|| DispatchError::unknown_operation(request.op.as_str()))?;
        let handler = self
            .handlers
            .get(&op)
            .ok_or_else(|| DispatchError::unsupported(op.to_string()))?;
        debug!(target: DISPATCH_TARGET, %op, id = request.id, "routing request");
        handler(state, &request.payload)
    }
}
