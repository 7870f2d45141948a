//! Database layer for Readmark

mod connection;
mod migrations;
mod repository;
mod settings_repository;

pub use connection::Database;
pub use repository::{BookmarkRepository, SqliteBookmarkRepository};
pub use settings_repository::SettingsRepository;
