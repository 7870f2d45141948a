use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] readmark_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Bookmark ID cannot be empty")]
    EmptyBookmarkId,
    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Sync(String),
    #[error("Server rejected the change: {0}")]
    Rejected(String),
    #[error(
        "Bookmark server is not configured. Run `readmark config init --server-url <URL>` first."
    )]
    SyncNotConfigured,
}
