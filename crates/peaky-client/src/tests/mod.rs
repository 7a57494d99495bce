//! Behavioural suite for the client against a live daemon.

mod client_behaviour;
