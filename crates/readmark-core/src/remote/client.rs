//! HTTP client for the bookmark server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LOCATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::error::{classify_error_response, ApiError, ApiResult};
use super::types::{
    decode_records, AuthToken, BookmarkPage, BookmarkPatch, CreateBookmark, CreatedBookmark, Credentials,
    EditAck, ListQuery, PageMeta, RemoteBookmark, UserProfile,
};
use crate::models::BookmarkId;
use crate::util::{compact_text, is_http_url};
use crate::Error;

const TOTAL_COUNT_HEADER: &str = "Total-Count";
const TOTAL_PAGES_HEADER: &str = "Total-Pages";
const CURRENT_PAGE_HEADER: &str = "Current-Page";
const BOOKMARK_ID_HEADER: &str = "Bookmark-Id";
const JSON_CONTENT: &str = "application/json";

/// Typed operations against the remote bookmark server.
#[async_trait]
pub trait RemoteBookmarkClient: Send + Sync {
    /// Fetch one page of bookmarks.
    async fn list_bookmarks(&self, query: &ListQuery) -> ApiResult<BookmarkPage>;

    async fn get_bookmark(&self, id: &BookmarkId) -> ApiResult<RemoteBookmark>;

    async fn create_bookmark(&self, request: &CreateBookmark) -> ApiResult<CreatedBookmark>;

    /// Send a partial patch; the server echoes the canonical fields.
    async fn edit_bookmark(&self, id: &BookmarkId, patch: &BookmarkPatch) -> ApiResult<EditAck>;

    /// Raw article HTML.
    async fn fetch_article(&self, id: &BookmarkId) -> ApiResult<String>;

    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthToken>;

    async fn profile(&self) -> ApiResult<UserProfile>;
}

/// [`RemoteBookmarkClient`] over reqwest with bearer-token auth.
#[derive(Clone)]
pub struct HttpBookmarkClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl std::fmt::Debug for HttpBookmarkClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpBookmarkClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpBookmarkClient {
    pub fn new(
        base_url: impl AsRef<str>,
        token: Option<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(format!(
                "Server URL must include http:// or https://: {base_url}"
            )));
        }

        Ok(Self {
            base_url,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .map_err(ApiError::from)?,
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    /// Copy of this client using a different bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bookmark_url(&self, id: &BookmarkId) -> String {
        format!(
            "{}/bookmarks/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify_error_response(status.as_u16(), &body);
        tracing::debug!(
            "Bookmark server answered {}: {} (body: {})",
            status,
            error,
            compact_text(&body)
        );
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self
            .send(request.header(ACCEPT, JSON_CONTENT))
            .await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| ApiError::Decode(error.to_string()))
    }
}

#[async_trait]
impl RemoteBookmarkClient for HttpBookmarkClient {
    async fn list_bookmarks(&self, query: &ListQuery) -> ApiResult<BookmarkPage> {
        let request = self
            .client
            .get(format!("{}/bookmarks", self.base_url))
            .header(ACCEPT, JSON_CONTENT)
            .query(&query.query_pairs());
        let response = self.send(request).await?;
        let meta = page_meta(response.headers());
        let body = response.text().await?;
        let (items, rejected) =
            decode_records(&body).map_err(|error| ApiError::Decode(error.to_string()))?;
        if !rejected.is_empty() {
            tracing::debug!(
                "{} of {} bookmarks on page at offset {} did not decode",
                rejected.len(),
                items.len() + rejected.len(),
                query.offset
            );
        }

        Ok(BookmarkPage {
            items,
            rejected,
            meta,
        })
    }

    async fn get_bookmark(&self, id: &BookmarkId) -> ApiResult<RemoteBookmark> {
        self.send_json(self.client.get(self.bookmark_url(id))).await
    }

    async fn create_bookmark(&self, request: &CreateBookmark) -> ApiResult<CreatedBookmark> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/bookmarks", self.base_url))
                    .json(request),
            )
            .await?;
        let headers = response.headers();
        Ok(CreatedBookmark {
            id: header_text(headers, BOOKMARK_ID_HEADER).and_then(|id| id.parse().ok()),
            location: header_text(headers, LOCATION.as_str()),
        })
    }

    async fn edit_bookmark(&self, id: &BookmarkId, patch: &BookmarkPatch) -> ApiResult<EditAck> {
        let response = self
            .send(
                self.client
                    .patch(self.bookmark_url(id))
                    .header(ACCEPT, JSON_CONTENT)
                    .json(patch),
            )
            .await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(EditAck::default());
        }
        serde_json::from_str(&body).map_err(|error| ApiError::Decode(error.to_string()))
    }

    async fn fetch_article(&self, id: &BookmarkId) -> ApiResult<String> {
        let request = self
            .client
            .get(format!("{}/article", self.bookmark_url(id)))
            .header(ACCEPT, "text/html");
        let response = self.send(request).await?;
        Ok(response.text().await?)
    }

    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthToken> {
        self.send_json(
            self.client
                .post(format!("{}/auth", self.base_url))
                .json(credentials),
        )
        .await
    }

    async fn profile(&self) -> ApiResult<UserProfile> {
        self.send_json(self.client.get(format!("{}/profile", self.base_url)))
            .await
    }
}

fn page_meta(headers: &HeaderMap) -> PageMeta {
    let number = |name| header_text(headers, name).and_then(|value| value.parse().ok());
    PageMeta {
        total_count: number(TOTAL_COUNT_HEADER),
        total_pages: number(TOTAL_PAGES_HEADER),
        current_page: number(CURRENT_PAGE_HEADER),
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
