use spritegen_client::ApiError;
use spritegen_core::error::CoreError;

/// Errors surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AppError {
    /// True for a missing record, whether reported locally or by the server.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::Validation(CoreError::NotFound { .. }) => true,
            AppError::Api(err) => err.is_not_found(),
            AppError::Validation(_) => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
