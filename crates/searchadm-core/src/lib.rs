//! searchadm core - shared vocabulary for the administration connection layer
//!
//! This crate defines what every other searchadm crate agrees on:
//!
//! - `Endpoint` - host/port pair of a remote administrative server
//! - `AdminBridge` / `AdminHandle` - the native bridge that opens and closes handles
//! - `AdminError` / `ErrorKind` - the error taxonomy surfaced to callers

mod bridge;
mod endpoint;
mod error;

pub use bridge::*;
pub use endpoint::*;
pub use error::*;
