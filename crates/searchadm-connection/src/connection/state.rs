//! Connection lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a connection
///
/// ```text
/// Created ──open──▶ Connecting ──ok──▶ Connected ──close──▶ Closed
///                        │                 │
///                        └──fail──▶ Error ◀┘ mark_failed
///
/// Error / Closed ──reconnect──▶ Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Registered but never opened
    #[default]
    Created,
    /// An open attempt is in flight
    Connecting,
    /// A live handle is held
    Connected,
    /// The last open attempt failed, or the handle was reported dead
    Error,
    /// The handle was released on request
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether a health sweep should retire an entry in this state.
    pub fn is_reapable(&self) -> bool {
        matches!(self, ConnectionState::Error | ConnectionState::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Created => "created",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
