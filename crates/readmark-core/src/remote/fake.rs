//! Scripted in-process remote used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;

use super::types::parse_instant;
use super::{
    ApiError, ApiResult, AuthToken, BookmarkPage, BookmarkPatch, CreateBookmark,
    CreatedBookmark, Credentials, EditAck, ListQuery, PageMeta, RemoteBookmark,
    RemoteBookmarkClient, UserProfile,
};
use crate::models::BookmarkId;

/// Serves a mutable remote set honoring limit, offset and `updated_since`.
#[derive(Default)]
pub struct FakeRemote {
    pub records: Mutex<Vec<RemoteBookmark>>,
    /// Error returned for the list request at this offset
    pub fail_at_offset: Mutex<Option<(usize, ApiError)>>,
    /// Errors returned by the next list requests, in order
    pub list_failures: Mutex<Vec<ApiError>>,
    pub list_delay: Mutex<Option<Duration>>,
    /// Serve the first page for every offset, without paging headers
    pub ignore_offset: AtomicBool,
    pub requests: Mutex<Vec<ListQuery>>,
    /// `"list"` and `"edit"` in call order
    pub calls: Mutex<Vec<&'static str>>,
    /// Replies for edit requests; an empty queue acknowledges with no fields
    pub edit_replies: Mutex<Vec<ApiResult<EditAck>>>,
    pub patches: Mutex<Vec<(BookmarkId, BookmarkPatch)>>,
    pub article_fetches: AtomicUsize,
}

impl FakeRemote {
    pub fn with_records(records: &[(&str, i64)]) -> Self {
        let remote = Self::default();
        *remote.records.lock().unwrap() = records
            .iter()
            .map(|(id, secs)| record(id, *secs))
            .collect();
        remote
    }

    pub fn requests(&self) -> Vec<ListQuery> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<(BookmarkId, BookmarkPatch)> {
        self.patches.lock().unwrap().clone()
    }
}

/// Remote record with an article, `updated` given in Unix seconds.
pub fn record(id: &str, updated_secs: i64) -> RemoteBookmark {
    RemoteBookmark {
        id: Some(id.to_string()),
        title: Some(format!("Remote {id}")),
        has_article: true,
        updated: DateTime::from_timestamp(updated_secs, 0).map(|at| at.to_rfc3339()),
        ..RemoteBookmark::default()
    }
}

#[async_trait]
impl RemoteBookmarkClient for FakeRemote {
    async fn list_bookmarks(&self, query: &ListQuery) -> ApiResult<BookmarkPage> {
        self.requests.lock().unwrap().push(query.clone());
        self.calls.lock().unwrap().push("list");
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut failures = self.list_failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }
        if let Some((offset, error)) = self.fail_at_offset.lock().unwrap().clone() {
            if offset == query.offset {
                return Err(error);
            }
        }

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
        if self.ignore_offset.load(Ordering::SeqCst) {
            return Ok(BookmarkPage {
                items: matching.into_iter().take(query.limit).collect(),
                ..BookmarkPage::default()
            });
        }
        let items = matching
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        Ok(BookmarkPage {
            items,
            rejected: Vec::new(),
            meta: PageMeta {
                total_count: Some(matching.len()),
                ..PageMeta::default()
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
                message: "not found".into(),
                code: 404,
            })
    }

    async fn create_bookmark(&self, _request: &CreateBookmark) -> ApiResult<CreatedBookmark> {
        Ok(CreatedBookmark {
            id: None,
            location: None,
        })
    }

    async fn edit_bookmark(&self, id: &BookmarkId, patch: &BookmarkPatch) -> ApiResult<EditAck> {
        self.patches
            .lock()
            .unwrap()
            .push((id.clone(), patch.clone()));
        self.calls.lock().unwrap().push("edit");
        let mut replies = self.edit_replies.lock().unwrap();
        if replies.is_empty() {
            Ok(EditAck::default())
        } else {
            replies.remove(0)
        }
    }

    async fn fetch_article(&self, id: &BookmarkId) -> ApiResult<String> {
        self.article_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(format!("<article>{id}</article>"))
    }

    async fn authenticate(&self, _credentials: &Credentials) -> ApiResult<AuthToken> {
        Err(ApiError::Server {
            message: "unsupported".into(),
            code: 501,
        })
    }

    async fn profile(&self) -> ApiResult<UserProfile> {
        Ok(UserProfile::default())
    }
}
