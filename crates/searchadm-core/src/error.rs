//! Error types for searchadm

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Endpoint;

/// Core error type for connection lifecycle operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdminError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Pool is full (capacity {capacity})")]
    PoolFull { capacity: usize },

    #[error("No instance specified and no default instance is set")]
    NoInstance,

    #[error("Failed to open {target} at {endpoint}: {message}")]
    OpenFailed {
        target: String,
        endpoint: Endpoint,
        message: String,
    },

    #[error("Failed to close {target} at {endpoint}: {message}")]
    CloseFailed {
        target: String,
        endpoint: Endpoint,
        message: String,
    },

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl AdminError {
    /// Machine-readable category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AdminError::NotFound(_) => ErrorKind::NotFound,
            AdminError::NotConnected(_) => ErrorKind::NotConnected,
            AdminError::NotAvailable(_) => ErrorKind::NotAvailable,
            AdminError::PoolFull { .. } => ErrorKind::PoolFull,
            AdminError::NoInstance => ErrorKind::NoInstance,
            AdminError::OpenFailed { .. } => ErrorKind::OpenFailed,
            AdminError::CloseFailed { .. } => ErrorKind::CloseFailed,
            AdminError::Bridge(_) => ErrorKind::Bridge,
            AdminError::Configuration(_) => ErrorKind::Configuration,
            AdminError::Runtime(_) => ErrorKind::Runtime,
        }
    }

    /// Whether retrying or reconnecting may resolve the error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdminError::OpenFailed { .. }
                | AdminError::NotConnected(_)
                | AdminError::NotAvailable(_)
        )
    }
}

/// Stable error codes exposed through the request/response protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    NotConnected,
    NotAvailable,
    PoolFull,
    NoInstance,
    OpenFailed,
    CloseFailed,
    Bridge,
    Configuration,
    Runtime,
    InvalidRequest,
}

/// Result type alias for searchadm operations
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AdminError::AlreadyExists("a".into()), ErrorKind::AlreadyExists, false)]
    #[case(AdminError::NotFound("a".into()), ErrorKind::NotFound, false)]
    #[case(AdminError::NotConnected("a".into()), ErrorKind::NotConnected, true)]
    #[case(AdminError::NotAvailable("a".into()), ErrorKind::NotAvailable, true)]
    #[case(AdminError::PoolFull { capacity: 2 }, ErrorKind::PoolFull, false)]
    #[case(AdminError::NoInstance, ErrorKind::NoInstance, false)]
    #[case(AdminError::Bridge("boom".into()), ErrorKind::Bridge, false)]
    fn test_error_kind_and_retryable(
        #[case] error: AdminError,
        #[case] kind: ErrorKind,
        #[case] retryable: bool,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn test_open_failed_message_carries_context() {
        let error = AdminError::OpenFailed {
            target: "primary".into(),
            endpoint: Endpoint::new("10.0.0.5", 9312),
            message: "connection refused".into(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to open primary at 10.0.0.5:9312: connection refused"
        );
        assert!(error.is_retryable());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::PoolFull).unwrap();
        assert_eq!(json, "\"pool_full\"");
        let kind: ErrorKind = serde_json::from_str("\"no_instance\"").unwrap();
        assert_eq!(kind, ErrorKind::NoInstance);
    }
}
