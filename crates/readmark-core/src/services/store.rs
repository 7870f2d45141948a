//! Shared local bookmark store used by the sync engine and clients.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::{watch, Mutex};

use crate::db::{BookmarkRepository, Database, SettingsRepository, SqliteBookmarkRepository};
use crate::models::{Bookmark, BookmarkFilter, BookmarkId};
use crate::{Error, Result};

/// Thread-safe, cloneable store over the local bookmark database.
///
/// Every operation runs on the blocking thread pool while holding the
/// connection lock, so writes are serialized row-wise last-writer-wins.
#[derive(Clone)]
pub struct LocalBookmarkStore {
    db: Arc<Mutex<Database>>,
    changes: Arc<watch::Sender<u64>>,
}

impl LocalBookmarkStore {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!("Opening bookmark database at {}", db_path.display());
        let db = tokio::task::spawn_blocking(move || Database::open(&db_path)).await??;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = tokio::task::spawn_blocking(Database::open_in_memory).await??;
        Ok(Self::from_database(db))
    }

    fn from_database(db: Database) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            changes: Arc::new(changes),
        }
    }

    async fn run<T, F>(db: Arc<Mutex<Database>>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let mut db = db.blocking_lock();
            f(&mut db)
        })
        .await?
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteBookmarkRepository<'_>) -> Result<T> + Send + 'static,
    {
        Self::run(Arc::clone(&self.db), move |db| {
            f(&SqliteBookmarkRepository::new(db.connection()))
        })
        .await
    }

    /// Run `f` inside a single `SQLite` transaction.
    ///
    /// Subscribers are not notified; call [`Self::notify_changed`] when the
    /// transaction modified rows.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteBookmarkRepository<'_>) -> Result<T> + Send + 'static,
    {
        Self::run(Arc::clone(&self.db), move |db| {
            let tx = db.connection_mut().transaction()?;
            let output = {
                let repo = SqliteBookmarkRepository::new(&tx);
                f(&repo)?
            };
            tx.commit()?;
            Ok(output)
        })
        .await
    }

    /// Run `f` against the key/value settings table.
    pub async fn with_settings<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SettingsRepository<'_>) -> Result<T> + Send + 'static,
    {
        Self::run(Arc::clone(&self.db), move |db| {
            f(&SettingsRepository::new(db.connection()))
        })
        .await
    }

    /// Wake every live subscription.
    pub fn notify_changed(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    /// Fetch a bookmark by id, including soft-deleted rows.
    pub async fn get(&self, id: &BookmarkId) -> Result<Option<Bookmark>> {
        let id = id.clone();
        self.read(move |repo| repo.get(&id)).await
    }

    /// Query non-deleted bookmarks matching the filter.
    pub async fn query(&self, filter: BookmarkFilter) -> Result<Vec<Bookmark>> {
        self.read(move |repo| repo.query(&filter)).await
    }

    /// The most recently updated bookmark.
    pub async fn last_updated(&self) -> Result<Option<Bookmark>> {
        self.read(|repo| repo.last_updated()).await
    }

    /// Bookmarks whose local edits are not yet acknowledged by the server.
    pub async fn list_pending(&self) -> Result<Vec<Bookmark>> {
        self.read(|repo| repo.list_pending()).await
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<usize> {
        self.read(|repo| repo.count()).await
    }

    /// Cached article body, if one was stored.
    pub async fn article(&self, id: &BookmarkId) -> Result<Option<String>> {
        Ok(self
            .get(id)
            .await?
            .and_then(|bookmark| bookmark.article_content))
    }

    /// Cache an article body. Returns `false` when the bookmark is missing
    /// or has no article.
    pub async fn set_article_content(&self, id: &BookmarkId, content: String) -> Result<bool> {
        let id = id.clone();
        let stored = self
            .transaction(move |repo| repo.set_article_content(&id, &content))
            .await?;
        if stored {
            self.notify_changed();
        }
        Ok(stored)
    }

    /// Atomically read, modify and write one bookmark row.
    pub async fn update_with<T, F>(&self, id: &BookmarkId, f: F) -> Result<(Bookmark, T)>
    where
        T: Send + 'static,
        F: FnOnce(&mut Bookmark) -> T + Send + 'static,
    {
        let id = id.clone();
        let updated = self
            .transaction(move |repo| {
                let mut bookmark = repo
                    .get(&id)?
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;
                let output = f(&mut bookmark);
                repo.upsert(&bookmark)?;
                Ok((bookmark, output))
            })
            .await?;
        self.notify_changed();
        Ok(updated)
    }

    /// Subscribe to the live result set of a filter.
    pub fn subscribe(&self, filter: BookmarkFilter) -> QuerySubscription {
        QuerySubscription {
            db: Arc::downgrade(&self.db),
            changes: self.changes.subscribe(),
            filter,
            delivered_initial: false,
        }
    }
}

/// Live query over the store.
///
/// Yields the current rows first, then a fresh result after every committed
/// change. Dropping the subscription detaches it; it ends once every store
/// handle is gone.
pub struct QuerySubscription {
    db: Weak<Mutex<Database>>,
    changes: watch::Receiver<u64>,
    filter: BookmarkFilter,
    delivered_initial: bool,
}

impl QuerySubscription {
    pub async fn next(&mut self) -> Option<Result<Vec<Bookmark>>> {
        if self.delivered_initial {
            self.changes.changed().await.ok()?;
        } else {
            self.delivered_initial = true;
            self.changes.borrow_and_update();
        }

        let db = self.db.upgrade()?;
        let filter = self.filter.clone();
        Some(
            LocalBookmarkStore::run(db, move |db| {
                SqliteBookmarkRepository::new(db.connection()).query(&filter)
            })
            .await,
        )
    }
}
