//! Caller side of the peakypanes daemon protocol.
//!
//! [`Client`] owns one connection to the daemon. A reader thread routes
//! responses to the call waiting on their correlation ID and queues events
//! for a delivery thread, which hands them to whoever holds the receiver
//! from [`Client::events`]. Events with the same key collapse while the
//! consumer is busy, so a slow consumer sees the newest state rather than a
//! backlog.
//!
//! Every catalog operation has a typed wrapper on [`Client`]. The
//! [`lifecycle`] helpers probe the socket, start a daemon when nothing
//! answers, and stop a running one.
//!
//! ```no_run
//! use peaky_client::lifecycle::{DaemonOptions, ensure_daemon_running};
//! use peaky_protocol::Context;
//!
//! let context = Context::background();
//! let client = ensure_daemon_running(&DaemonOptions::default(), &context)?;
//! for name in client.session_names(&context)? {
//!     println!("{name}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod client;
mod errors;
pub mod lifecycle;
mod ops;
mod transport;

pub use client::Client;
pub use errors::ClientError;
pub use lifecycle::{
    DaemonOptions, LifecycleError, connect_default, ensure_daemon_running, probe_daemon,
    stop_daemon,
};

#[cfg(test)]
mod tests;
