//! Client connections: lifecycle, outbound queues and the serving loops.
//!
//! Every accepted socket becomes a [`Connection`] registered with the
//! daemon's [`ConnectionRegistry`]. [`ConnectionManager`] drives it with one
//! read loop, one write loop and a pool of pane-view render workers. Closing
//! a connection is idempotent: it cancels outstanding renders, wakes every
//! waiting thread and shuts the socket down.

mod manager;
mod record;
mod registry;

pub use manager::ConnectionManager;
pub use record::{Connection, ConnectionError, Outgoing};
pub use registry::ConnectionRegistry;

/// Responses buffered per connection before senders wait.
pub const RESPONSE_QUEUE_CAPACITY: usize = 64;
/// Distinct event keys buffered per connection.
pub const EVENT_QUEUE_CAPACITY: usize = 128;

pub(crate) const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

#[cfg(test)]
mod tests;
