//! Request dispatch for daemon connections.
//!
//! A [`Router`] maps every catalog [`peaky_protocol::Op`] to a plain handler
//! function. Handlers decode their request payload, act on the shared
//! [`crate::state::DaemonState`] and encode a response payload. Failures are
//! typed as [`DispatchError`] and rendered into the response's error text;
//! the response always echoes the request's correlation ID.
//!
//! `pane_view` requests read from a connection never reach the router: the
//! connection hands them to its pane-view scheduler. A `pane_view` reaching
//! the router is rendered inline without a cache.

mod errors;
mod handlers;
mod router;

pub use self::errors::DispatchError;
pub use self::router::{DISPATCH_TARGET, Handler, Router};
