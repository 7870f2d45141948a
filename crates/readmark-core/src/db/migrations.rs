//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS bookmarks (
            id TEXT PRIMARY KEY,
            href TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            site_name TEXT NOT NULL,
            site TEXT NOT NULL,
            description TEXT NOT NULL,
            authors TEXT NOT NULL,
            lang TEXT NOT NULL,
            text_direction TEXT NOT NULL,
            document_type TEXT NOT NULL,
            content_type TEXT NOT NULL,
            has_article INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            is_archived INTEGER NOT NULL DEFAULT 0,
            labels TEXT NOT NULL,
            read_progress INTEGER NOT NULL DEFAULT 0
                CHECK (read_progress BETWEEN 0 AND 100),
            word_count INTEGER,
            reading_time INTEGER,
            resources TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            article_content TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_bookmarks_updated ON bookmarks(updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_bookmarks_created ON bookmarks(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_bookmarks_type ON bookmarks(content_type);
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        INSERT INTO schema_version (version) VALUES (1);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: track unacknowledged local edits
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "ALTER TABLE bookmarks ADD COLUMN pending_fields INTEGER NOT NULL DEFAULT 0;
        CREATE INDEX IF NOT EXISTS idx_bookmarks_pending ON bookmarks(pending_fields)
            WHERE pending_fields != 0;
        INSERT INTO schema_version (version) VALUES (2);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
