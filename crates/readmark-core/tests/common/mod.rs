//! Scripted remote shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use readmark_core::remote::types::parse_instant;
use readmark_core::remote::{
    ApiError, ApiResult, AuthToken, BookmarkPage, BookmarkPatch, CreateBookmark, CreatedBookmark,
    Credentials, EditAck, ListQuery, PageMeta, RemoteBookmark, RemoteBookmarkClient, UserProfile,
};
use readmark_core::services::LocalBookmarkStore;
use readmark_core::sync::{ReconciliationEngine, SqliteSyncStateTracker, SyncOrchestrator};
use readmark_core::BookmarkId;

/// In-memory bookmark server.
#[derive(Default)]
pub struct ScriptedRemote {
    pub records: Mutex<Vec<RemoteBookmark>>,
    pub requests: Mutex<Vec<ListQuery>>,
    /// Error returned for every edit request when set
    pub edit_error: Mutex<Option<ApiError>>,
}

impl ScriptedRemote {
    pub fn with_records(records: &[(&str, i64)]) -> Arc<Self> {
        let remote = Self::default();
        remote.replace_records(records);
        Arc::new(remote)
    }

    pub fn replace_records(&self, records: &[(&str, i64)]) {
        *self.records.lock().unwrap() = records.iter().map(|(id, at)| record(id, *at)).collect();
    }

    pub fn push_record(&self, id: &str, updated_secs: i64) {
        let mut records = self.records.lock().unwrap();
        records.retain(|existing| existing.id.as_deref() != Some(id));
        records.push(record(id, updated_secs));
    }

    pub fn take_requests(&self) -> Vec<ListQuery> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

pub fn record(id: &str, updated_secs: i64) -> RemoteBookmark {
    let updated = DateTime::from_timestamp(updated_secs, 0).map(|at| at.to_rfc3339());
    RemoteBookmark {
        id: Some(id.to_string()),
        url: Some(format!("https://example.com/{id}")),
        title: Some(format!("Bookmark {id}")),
        kind: Some("article".into()),
        has_article: true,
        created: updated.clone(),
        updated,
        ..RemoteBookmark::default()
    }
}

pub fn id(raw: &str) -> BookmarkId {
    raw.parse().unwrap()
}

#[async_trait]
impl RemoteBookmarkClient for ScriptedRemote {
    async fn list_bookmarks(&self, query: &ListQuery) -> ApiResult<BookmarkPage> {
        self.requests.lock().unwrap().push(query.clone());
        let matching = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| {
                query.updated_since.map_or(true, |since| {
                    parse_instant(record.updated.as_deref()).is_some_and(|at| at >= since)
                })
            })
            .cloned()
            .collect::<Vec<_>>();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok(BookmarkPage {
            items,
            rejected: Vec::new(),
            meta: PageMeta {
                total_count: Some(total),
                total_pages: Some(total.div_ceil(query.limit.max(1))),
                current_page: Some(query.offset / query.limit.max(1) + 1),
            },
        })
    }

    async fn get_bookmark(&self, id: &BookmarkId) -> ApiResult<RemoteBookmark> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.id.as_deref() == Some(id.as_str()))
            .cloned()
            .ok_or_else(|| ApiError::Server {
                message: "Not found".into(),
                code: 404,
            })
    }

    async fn create_bookmark(&self, _request: &CreateBookmark) -> ApiResult<CreatedBookmark> {
        Ok(CreatedBookmark {
            id: None,
            location: None,
        })
    }

    async fn edit_bookmark(&self, _id: &BookmarkId, _patch: &BookmarkPatch) -> ApiResult<EditAck> {
        match self.edit_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(EditAck::default()),
        }
    }

    async fn fetch_article(&self, id: &BookmarkId) -> ApiResult<String> {
        Ok(format!("<p>{id}</p>"))
    }

    async fn authenticate(&self, _credentials: &Credentials) -> ApiResult<AuthToken> {
        Err(ApiError::Server {
            message: "Not implemented".into(),
            code: 501,
        })
    }

    async fn profile(&self) -> ApiResult<UserProfile> {
        Ok(UserProfile::default())
    }
}

pub async fn orchestrator(
    remote: Arc<ScriptedRemote>,
    page_size: usize,
) -> (SyncOrchestrator, LocalBookmarkStore) {
    let store = LocalBookmarkStore::open_in_memory().await.unwrap();
    let orchestrator = SyncOrchestrator::new(
        remote,
        ReconciliationEngine::new(store.clone()),
        Arc::new(SqliteSyncStateTracker::new(store.clone())),
    )
    .with_page_size(page_size);
    (orchestrator, store)
}
