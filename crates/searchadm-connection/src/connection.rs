//! Connection state machine
//!
//! A [`ServerConnection`] owns at most one bridge handle. The handle is
//! present if and only if the connection is [`ConnectionState::Connected`].

mod server;
mod state;


pub use server::{ConnectionSnapshot, ConnectionStats, ServerConnection};
pub use state::ConnectionState;
