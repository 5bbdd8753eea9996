use thiserror::Error;

use crate::auth::AuthError;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    AuthError(#[from] AuthError),

    #[error(transparent)]
    CoreError(#[from] kunai_core::error::CoreError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
