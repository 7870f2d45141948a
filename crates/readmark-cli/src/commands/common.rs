use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use readmark_core::config::ClientConfig;
use readmark_core::models::ReadState;
use readmark_core::remote::{HttpBookmarkClient, RemoteBookmarkClient};
use readmark_core::services::LocalBookmarkStore;
use readmark_core::sync::{
    MutationPropagator, ReconciliationEngine, SqliteSyncStateTracker, SyncOrchestrator,
};
use readmark_core::{Bookmark, BookmarkFilter, BookmarkId};
use serde::Serialize;

use crate::cli::ContentTypeArg;
use crate::config::{load_config, token_from_env};
use crate::error::CliError;

/// Local library plus a configured server connection.
pub struct Session {
    pub config: ClientConfig,
    pub store: LocalBookmarkStore,
    pub remote: Arc<dyn RemoteBookmarkClient>,
}

impl Session {
    pub async fn open(db_path: &Path, config_path: &Path) -> Result<Self, CliError> {
        let config = load_config(config_path)?;
        let remote = connect_remote(&config)?;
        let store = open_store(db_path).await?;
        Ok(Self {
            config,
            store,
            remote,
        })
    }

    pub fn propagator(&self) -> MutationPropagator {
        MutationPropagator::new(self.store.clone(), Arc::clone(&self.remote))
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            Arc::clone(&self.remote),
            ReconciliationEngine::new(self.store.clone()),
            Arc::new(SqliteSyncStateTracker::new(self.store.clone())),
        )
        .with_page_size(self.config.page_size)
        .with_pending_push(self.propagator())
    }
}

pub async fn open_store(db_path: &Path) -> Result<LocalBookmarkStore, CliError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(LocalBookmarkStore::open_path(db_path).await?)
}

pub fn connect_remote(config: &ClientConfig) -> Result<Arc<dyn RemoteBookmarkClient>, CliError> {
    let server_url = config
        .server_url
        .as_deref()
        .ok_or(CliError::SyncNotConfigured)?;
    let token = config.resolve_token(token_from_env());
    if token.is_none() {
        tracing::warn!("No API token configured; requests are sent unauthenticated");
    }
    let client = HttpBookmarkClient::new(server_url, token, config.request_timeout())?;
    Ok(Arc::new(client))
}

pub fn parse_bookmark_id(raw: &str) -> Result<BookmarkId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyBookmarkId);
    }
    Ok(trimmed.parse()?)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ListFlags {
    pub content_type: Option<ContentTypeArg>,
    pub unread: bool,
    pub read: bool,
    pub archived: bool,
    pub not_archived: bool,
    pub favorite: bool,
}

pub fn build_filter(flags: ListFlags, limit: usize) -> BookmarkFilter {
    let mut filter = BookmarkFilter::default().limit(limit);
    if let Some(content_type) = flags.content_type {
        filter = filter.content_type(content_type.into());
    }
    if flags.unread {
        filter = filter.read_state(ReadState::Unread);
    } else if flags.read {
        filter = filter.read_state(ReadState::Read);
    }
    if flags.archived {
        filter = filter.archived(true);
    } else if flags.not_archived {
        filter = filter.archived(false);
    }
    if flags.favorite {
        filter = filter.favorite(true);
    }
    filter
}

#[derive(Debug, Serialize)]
pub struct BookmarkListItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub site_name: String,
    pub content_type: String,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub read_progress: u8,
    pub labels: Vec<String>,
    pub updated: String,
    pub relative_time: String,
    pub has_article: bool,
    pub pending_sync: bool,
}

pub fn bookmark_to_list_item(bookmark: &Bookmark, now: DateTime<Utc>) -> BookmarkListItem {
    BookmarkListItem {
        id: bookmark.id.to_string(),
        title: bookmark.title.clone(),
        url: bookmark.url.clone(),
        site_name: bookmark.site_name.clone(),
        content_type: bookmark.content_type.as_str().to_string(),
        is_favorite: bookmark.is_favorite,
        is_archived: bookmark.is_archived,
        read_progress: bookmark.read_progress.value(),
        labels: bookmark.labels.clone(),
        updated: bookmark.updated.to_rfc3339(),
        relative_time: format_relative_time(bookmark.updated, now),
        has_article: bookmark.has_article,
        pending_sync: !bookmark.pending.is_empty(),
    }
}

pub fn format_bookmark_lines(bookmarks: &[Bookmark], now: DateTime<Utc>) -> Vec<String> {
    bookmarks
        .iter()
        .map(|bookmark| {
            format!(
                "{}  {}{}{} {:>3}%  {}  ({})",
                bookmark.id,
                if bookmark.is_favorite { 'F' } else { '-' },
                if bookmark.is_archived { 'A' } else { '-' },
                if bookmark.pending.is_empty() { ' ' } else { '*' },
                bookmark.read_progress.value(),
                title_preview(bookmark, 60),
                format_relative_time(bookmark.updated, now)
            )
        })
        .collect()
}

/// Title on one line, falling back to the URL for untitled bookmarks.
pub fn title_preview(bookmark: &Bookmark, max_chars: usize) -> String {
    let source = if bookmark.title.trim().is_empty() {
        bookmark.url.as_str()
    } else {
        bookmark.title.as_str()
    };
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "never".to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
