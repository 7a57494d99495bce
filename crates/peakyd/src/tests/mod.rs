//! Behavioural suites for the daemon.

mod behaviour;
mod support;
