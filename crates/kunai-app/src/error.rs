use thiserror::Error;

/// Application-level errors (HTTP layer)
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    ServiceError(#[from] kunai_service::error::ServiceError),

    #[error(transparent)]
    CoreError(#[from] kunai_core::error::CoreError),

    #[error("File tree root {path}: {source}")]
    FileRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type AppResult<T> = std::result::Result<T, AppError>;
