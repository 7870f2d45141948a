//! Lazy article body cache.

use std::sync::Arc;

use super::LocalBookmarkStore;
use crate::models::BookmarkId;
use crate::remote::RemoteBookmarkClient;
use crate::{Error, Result};

/// Serves article HTML from the local cache, fetching it on first read.
#[derive(Clone)]
pub struct ArticleLoader {
    store: LocalBookmarkStore,
    remote: Arc<dyn RemoteBookmarkClient>,
}

impl ArticleLoader {
    pub fn new(store: LocalBookmarkStore, remote: Arc<dyn RemoteBookmarkClient>) -> Self {
        Self { store, remote }
    }

    /// Article body for a bookmark.
    ///
    /// Bookmarks without an article are refused before any network call.
    pub async fn load(&self, id: &BookmarkId) -> Result<String> {
        let bookmark = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if !bookmark.has_article {
            return Err(Error::InvalidInput(format!(
                "Bookmark {id} has no article content"
            )));
        }
        if let Some(content) = bookmark.article_content {
            return Ok(content);
        }

        tracing::debug!("Fetching article body for bookmark {}", id);
        let content = self.remote.fetch_article(id).await?;
        if !self.store.set_article_content(id, content.clone()).await? {
            tracing::warn!("Bookmark {} changed while its article was fetched", id);
        }
        Ok(content)
    }
}
