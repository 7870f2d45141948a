//! Key/value settings repository

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Local-only key/value storage backed by the `settings` table.
pub struct SettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_get_missing_returns_none() {
        let db = Database::open_in_memory().unwrap();
        let repo = SettingsRepository::new(db.connection());
        assert_eq!(repo.get("absent").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_and_remove_clears() {
        let db = Database::open_in_memory().unwrap();
        let repo = SettingsRepository::new(db.connection());

        repo.set("sync.initial_done", "false").unwrap();
        repo.set("sync.initial_done", "true").unwrap();
        assert_eq!(
            repo.get("sync.initial_done").unwrap().as_deref(),
            Some("true")
        );

        repo.remove("sync.initial_done").unwrap();
        assert_eq!(repo.get("sync.initial_done").unwrap(), None);
    }
}
