//! Errors returned by lens operations

use thiserror::Error;

use crate::database::SessionError;
use crate::lens::registration::ValidationError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid query parameters: {0}")]
    InvalidParams(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

impl RegistryError {
    /// Whether the failure was caused by user input rather than the database
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RegistryError::Validation(_) | RegistryError::InvalidParams(_)
        )
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
