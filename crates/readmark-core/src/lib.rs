//! readmark-core - Core library for Readmark
//!
//! This crate mirrors a user's bookmarks from a remote bookmark server into a
//! local SQLite store for offline reading, and pushes local favorite, archive
//! and read-progress edits back to the server.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Bookmark, BookmarkFilter, BookmarkId, ContentType, SyncCursor};
