//! Bookmark repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT and counters

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{
    Bookmark, BookmarkFilter, BookmarkId, ContentType, PendingFields, ReadProgress, ReadState,
};
use crate::util::from_timestamp_millis;

const COLUMNS: &str = "id, href, url, title, site_name, site, description, authors, lang,
    text_direction, document_type, content_type, has_article, is_deleted, is_favorite,
    is_archived, labels, read_progress, word_count, reading_time, resources, created_at,
    updated_at, article_content, pending_fields";

/// Trait for bookmark storage operations
pub trait BookmarkRepository {
    /// Get a bookmark by ID, including soft-deleted rows
    fn get(&self, id: &BookmarkId) -> Result<Option<Bookmark>>;

    /// Insert or fully replace a bookmark row
    fn upsert(&self, bookmark: &Bookmark) -> Result<()>;

    /// All locally known IDs
    fn list_ids(&self) -> Result<Vec<BookmarkId>>;

    /// Hard delete the given rows, returning how many existed
    fn delete_ids(&self, ids: &[BookmarkId]) -> Result<usize>;

    /// Query non-deleted bookmarks matching the filter, newest first
    fn query(&self, filter: &BookmarkFilter) -> Result<Vec<Bookmark>>;

    /// The most recently updated bookmark
    fn last_updated(&self) -> Result<Option<Bookmark>>;

    /// Bookmarks carrying local edits the server has not acknowledged
    fn list_pending(&self) -> Result<Vec<Bookmark>>;

    /// Store the article body for a bookmark
    fn set_article_content(&self, id: &BookmarkId, content: &str) -> Result<bool>;

    /// Number of stored rows, including soft-deleted ones
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `BookmarkRepository`
pub struct SqliteBookmarkRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBookmarkRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a bookmark from a database row
    fn parse_bookmark(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bookmark> {
        let id: String = row.get(0)?;
        let content_type: String = row.get(11)?;
        let read_progress: i64 = row.get(17)?;
        let pending_bits: u8 = row.get(24)?;

        Ok(Bookmark {
            id: id.parse().map_err(|error| conversion_error(0, error))?,
            href: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            site_name: row.get(4)?,
            site: row.get(5)?,
            description: row.get(6)?,
            authors: json_column(row, 7)?,
            lang: row.get(8)?,
            text_direction: row.get(9)?,
            document_type: row.get(10)?,
            content_type: content_type
                .parse::<ContentType>()
                .map_err(|error| conversion_error(11, error))?,
            has_article: row.get(12)?,
            is_deleted: row.get(13)?,
            is_favorite: row.get(14)?,
            is_archived: row.get(15)?,
            labels: json_column(row, 16)?,
            read_progress: ReadProgress::new(read_progress)
                .map_err(|error| conversion_error(17, error))?,
            word_count: row.get(18)?,
            reading_time: row.get(19)?,
            resources: json_column(row, 20)?,
            created: from_timestamp_millis(row.get(21)?),
            updated: from_timestamp_millis(row.get(22)?),
            article_content: row.get(23)?,
            pending: PendingFields::from_bits(pending_bits),
        })
    }
}

impl BookmarkRepository for SqliteBookmarkRepository<'_> {
    fn get(&self, id: &BookmarkId) -> Result<Option<Bookmark>> {
        let bookmark = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM bookmarks WHERE id = ?"),
                params![id.as_str()],
                Self::parse_bookmark,
            )
            .optional()?;
        Ok(bookmark)
    }

    fn upsert(&self, bookmark: &Bookmark) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO bookmarks ({COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                bookmark.id.as_str(),
                bookmark.href,
                bookmark.url,
                bookmark.title,
                bookmark.site_name,
                bookmark.site,
                bookmark.description,
                serde_json::to_string(&bookmark.authors)?,
                bookmark.lang,
                bookmark.text_direction,
                bookmark.document_type,
                bookmark.content_type.as_str(),
                bookmark.has_article,
                bookmark.is_deleted,
                bookmark.is_favorite,
                bookmark.is_archived,
                serde_json::to_string(&bookmark.labels)?,
                bookmark.read_progress.value(),
                bookmark.word_count,
                bookmark.reading_time,
                serde_json::to_string(&bookmark.resources)?,
                bookmark.created.timestamp_millis(),
                bookmark.updated.timestamp_millis(),
                bookmark.article_content,
                bookmark.pending.bits(),
            ],
        )?;
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<BookmarkId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM bookmarks")?;
        let ids = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                id.parse::<BookmarkId>()
                    .map_err(|error| conversion_error(0, error))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn delete_ids(&self, ids: &[BookmarkId]) -> Result<usize> {
        let mut stmt = self.conn.prepare("DELETE FROM bookmarks WHERE id = ?")?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute(params![id.as_str()])?;
        }
        Ok(deleted)
    }

    fn query(&self, filter: &BookmarkFilter) -> Result<Vec<Bookmark>> {
        let (sql, values) = compose_filter(filter);
        let mut stmt = self.conn.prepare(&sql)?;
        let bookmarks = stmt
            .query_map(params_from_iter(values), Self::parse_bookmark)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bookmarks)
    }

    fn last_updated(&self) -> Result<Option<Bookmark>> {
        let bookmark = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM bookmarks ORDER BY updated_at DESC LIMIT 1"),
                [],
                Self::parse_bookmark,
            )
            .optional()?;
        Ok(bookmark)
    }

    fn list_pending(&self) -> Result<Vec<Bookmark>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM bookmarks WHERE pending_fields != 0 ORDER BY updated_at ASC"
        ))?;
        let bookmarks = stmt
            .query_map([], Self::parse_bookmark)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bookmarks)
    }

    fn set_article_content(&self, id: &BookmarkId, content: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE bookmarks SET article_content = ? WHERE id = ? AND has_article = 1",
            params![content, id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Build a parameterized query from the filter.
///
/// Every criterion maps to a fixed SQL fragment with a bound parameter.
fn compose_filter(filter: &BookmarkFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["is_deleted = 0"];
    let mut values = Vec::new();

    if let Some(content_type) = filter.content_type {
        clauses.push("content_type = ?");
        values.push(Value::Text(content_type.as_str().to_string()));
    }
    match filter.read_state {
        Some(ReadState::Read) => {
            clauses.push("read_progress = ?");
            values.push(Value::Integer(i64::from(ReadProgress::READ.value())));
        }
        Some(ReadState::Unread) => {
            clauses.push("read_progress < ?");
            values.push(Value::Integer(i64::from(ReadProgress::READ.value())));
        }
        None => {}
    }
    if let Some(archived) = filter.archived {
        clauses.push("is_archived = ?");
        values.push(Value::Integer(i64::from(archived)));
    }
    if let Some(favorite) = filter.favorite {
        clauses.push("is_favorite = ?");
        values.push(Value::Integer(i64::from(favorite)));
    }

    let mut sql = format!(
        "SELECT {COLUMNS} FROM bookmarks WHERE {} ORDER BY created_at DESC, id ASC",
        clauses.join(" AND ")
    );
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(limit as i64));
    }

    (sql, values)
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    index: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw).map_err(|error| conversion_error(index, error))
}

fn conversion_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::fixtures::bookmark;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup();
        let repo = SqliteBookmarkRepository::new(db.connection());

        let mut original = bookmark("b1", 1_700_000_000);
        original.labels = vec!["rust".to_string(), "sync".to_string()];
        original.resources.icon = Some(crate::models::ImageResource {
            src: "https://read.example.com/icon.png".to_string(),
            width: 32,
            height: 32,
        });
        repo.upsert(&original).unwrap();

        let fetched = repo.get(&original.id).unwrap().unwrap();
        assert_eq!(fetched, original);
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let db = setup();
        let repo = SqliteBookmarkRepository::new(db.connection());

        let mut row = bookmark("b1", 1_700_000_000);
        repo.upsert(&row).unwrap();
        row.title = "Renamed".to_string();
        repo.upsert(&row).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.get(&row.id).unwrap().unwrap().title, "Renamed");
    }

    #[test]
    fn test_delete_ids_counts_existing_rows() {
        let db = setup();
        let repo = SqliteBookmarkRepository::new(db.connection());

        repo.upsert(&bookmark("a", 1)).unwrap();
        repo.upsert(&bookmark("b", 2)).unwrap();

        let deleted = repo
            .delete_ids(&["a".parse().unwrap(), "missing".parse().unwrap()])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.list_ids().unwrap(), vec!["b".parse().unwrap()]);
    }

    #[test]
    fn test_query_combines_filters() {
        let db = setup();
        let repo = SqliteBookmarkRepository::new(db.connection());

        let mut read_favorite = bookmark("read-fav", 1);
        read_favorite.read_progress = ReadProgress::READ;
        read_favorite.is_favorite = true;

        let mut unread_video = bookmark("unread-video", 2);
        unread_video.content_type = ContentType::Video;

        let mut archived = bookmark("archived", 3);
        archived.is_archived = true;

        let mut deleted = bookmark("deleted", 4);
        deleted.is_deleted = true;

        for row in [&read_favorite, &unread_video, &archived, &deleted] {
            repo.upsert(row).unwrap();
        }

        let all = repo.query(&BookmarkFilter::default()).unwrap();
        assert_eq!(all.len(), 3);

        let unread = repo
            .query(&BookmarkFilter::default().read_state(ReadState::Unread))
            .unwrap();
        assert_eq!(unread.len(), 2);

        let favorites_read = repo
            .query(
                &BookmarkFilter::default()
                    .favorite(true)
                    .read_state(ReadState::Read),
            )
            .unwrap();
        assert_eq!(favorites_read.len(), 1);
        assert_eq!(favorites_read[0].id.as_str(), "read-fav");

        let unarchived_videos = repo
            .query(
                &BookmarkFilter::default()
                    .content_type(ContentType::Video)
                    .archived(false),
            )
            .unwrap();
        assert_eq!(unarchived_videos.len(), 1);
        assert_eq!(unarchived_videos[0].id.as_str(), "unread-video");

        let limited = repo.query(&BookmarkFilter::default().limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id.as_str(), "archived");
    }

    #[test]
    fn test_compose_filter_binds_values() {
        let (sql, values) = compose_filter(
            &BookmarkFilter::default()
                .content_type(ContentType::Picture)
                .favorite(true),
        );
        assert!(sql.contains("content_type = ?"));
        assert!(sql.contains("is_favorite = ?"));
        assert!(!sql.contains("picture"));
        assert_eq!(
            values,
            vec![Value::Text("picture".to_string()), Value::Integer(1)]
        );
    }

    #[test]
    fn test_last_updated_and_pending() {
        let db = setup();
        let repo = SqliteBookmarkRepository::new(db.connection());

        repo.upsert(&bookmark("old", 10)).unwrap();
        let mut newest = bookmark("new", 20);
        newest.pending = PendingFields::ARCHIVED;
        repo.upsert(&newest).unwrap();

        assert_eq!(repo.last_updated().unwrap().unwrap().id.as_str(), "new");
        let pending = repo.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].pending.contains(PendingFields::ARCHIVED));
    }

    #[test]
    fn test_article_content_requires_has_article() {
        let db = setup();
        let repo = SqliteBookmarkRepository::new(db.connection());

        let with_article = bookmark("with", 1);
        let mut without_article = bookmark("without", 1);
        without_article.has_article = false;
        repo.upsert(&with_article).unwrap();
        repo.upsert(&without_article).unwrap();

        assert!(repo
            .set_article_content(&with_article.id, "<p>hello</p>")
            .unwrap());
        assert!(!repo
            .set_article_content(&without_article.id, "<p>nope</p>")
            .unwrap());
        assert_eq!(
            repo.get(&with_article.id)
                .unwrap()
                .unwrap()
                .article_content
                .as_deref(),
            Some("<p>hello</p>")
        );
        assert_eq!(
            repo.get(&without_article.id).unwrap().unwrap().article_content,
            None
        );
    }
}
