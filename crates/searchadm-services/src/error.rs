use searchadm_core::{AdminError, ErrorKind};
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ServiceError {
    /// Machine-readable category reported to protocol clients
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Admin(e) => e.kind(),
            ServiceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ServiceError::Settings(_) => ErrorKind::Configuration,
            ServiceError::Encode(_) => ErrorKind::Runtime,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Admin(e) => e.is_retryable(),
            _ => false,
        }
    }
}
