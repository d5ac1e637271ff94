//! Error types for the helpdesk services

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelpdeskError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for HelpdeskError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => HelpdeskError::NotFound("row".to_string()),
            other => HelpdeskError::Storage(other.to_string()),
        }
    }
}
