//! Error types for readmark-core

use thiserror::Error;

use crate::remote::ApiError;

/// Result type alias using readmark-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in readmark-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bookmark not found
    #[error("Bookmark not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote bookmark server error
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// Blocking database task failed to complete
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::TaskJoin(error.to_string())
    }
}
