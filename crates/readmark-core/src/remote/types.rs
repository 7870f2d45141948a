//! Wire types for the bookmark server API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Bookmark, BookmarkId, ContentType, FieldChange, ImageResource, PendingFields, ReadProgress,
    Resource, Resources,
};
use crate::util::normalize_text_option;

/// Bookmark record as returned by list and fetch-one endpoints.
///
/// Every field is optional so one odd record never fails a whole page;
/// validation happens in the conversion to [`Bookmark`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteBookmark {
    pub id: Option<String>,
    pub href: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub site_name: Option<String>,
    pub site: Option<String>,
    pub description: Option<String>,
    pub authors: Option<Vec<String>>,
    pub lang: Option<String>,
    pub text_direction: Option<String>,
    pub document_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub has_article: bool,
    pub is_deleted: bool,
    pub is_marked: bool,
    pub is_archived: bool,
    pub labels: Option<Vec<String>>,
    pub read_progress: Option<i64>,
    pub word_count: Option<u32>,
    pub reading_time: Option<u32>,
    pub resources: RemoteResources,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteResources {
    pub article: Option<RemoteResource>,
    pub icon: Option<RemoteImage>,
    pub image: Option<RemoteImage>,
    pub thumbnail: Option<RemoteImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteResource {
    pub src: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteImage {
    pub src: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// A remote record that could not be turned into a [`Bookmark`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFailure {
    /// Identifier, when the record carried a usable one
    pub id: Option<BookmarkId>,
    pub reason: String,
}

impl RemoteBookmark {
    /// Identifier of the record if it is present and non-blank.
    pub fn bookmark_id(&self) -> Option<BookmarkId> {
        self.id.as_deref().and_then(|id| id.parse().ok())
    }
}

impl TryFrom<RemoteBookmark> for Bookmark {
    type Error = MappingFailure;

    fn try_from(remote: RemoteBookmark) -> Result<Self, Self::Error> {
        let id = remote.bookmark_id();
        let fail = |reason: String| MappingFailure {
            id: id.clone(),
            reason,
        };

        let bookmark_id = id
            .clone()
            .ok_or_else(|| fail("record has no id".to_string()))?;
        let updated = parse_instant(remote.updated.as_deref())
            .ok_or_else(|| fail(format!("invalid updated timestamp {:?}", remote.updated)))?;
        let created = match remote.created.as_deref() {
            None => updated,
            Some(raw) => parse_instant(Some(raw))
                .ok_or_else(|| fail(format!("invalid created timestamp {raw:?}")))?,
        };
        let content_type = match remote.kind.as_deref() {
            None => ContentType::Article,
            Some(kind) => kind
                .parse::<ContentType>()
                .map_err(|error| fail(error.to_string()))?,
        };
        let read_progress = ReadProgress::new(remote.read_progress.unwrap_or_default())
            .map_err(|error| fail(error.to_string()))?;

        Ok(Self {
            id: bookmark_id,
            href: remote.href.unwrap_or_default(),
            url: remote.url.unwrap_or_default(),
            title: remote.title.unwrap_or_default(),
            site_name: remote.site_name.unwrap_or_default(),
            site: remote.site.unwrap_or_default(),
            description: remote.description.unwrap_or_default(),
            authors: remote.authors.unwrap_or_default(),
            lang: remote.lang.unwrap_or_default(),
            text_direction: remote.text_direction.unwrap_or_default(),
            document_type: remote.document_type.unwrap_or_default(),
            content_type,
            has_article: remote.has_article,
            is_deleted: remote.is_deleted,
            is_favorite: remote.is_marked,
            is_archived: remote.is_archived,
            labels: remote.labels.unwrap_or_default(),
            read_progress,
            word_count: remote.word_count,
            reading_time: remote.reading_time,
            resources: Resources {
                article: remote
                    .resources
                    .article
                    .and_then(|article| normalize_text_option(article.src))
                    .map(|src| Resource { src }),
                icon: remote.resources.icon.and_then(RemoteImage::into_resource),
                image: remote.resources.image.and_then(RemoteImage::into_resource),
                thumbnail: remote
                    .resources
                    .thumbnail
                    .and_then(RemoteImage::into_resource),
            },
            created,
            updated,
            article_content: None,
            pending: PendingFields::NONE,
        })
    }
}

impl RemoteImage {
    fn into_resource(self) -> Option<ImageResource> {
        normalize_text_option(self.src).map(|src| ImageResource {
            src,
            width: self.width,
            height: self.height,
        })
    }
}

/// Parse an RFC 3339 instant into UTC.
pub fn parse_instant(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

/// Sortable list fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Created,
    Updated,
}

/// Sort field plus direction, encoded as one token (`-` prefix = descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl SortOrder {
    pub const fn ascending(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn descending(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub fn token(self) -> String {
        let name = match self.field {
            SortField::Created => "created",
            SortField::Updated => "updated",
        };
        if self.descending {
            format!("-{name}")
        } else {
            name.to_string()
        }
    }
}

/// Parameters of one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: usize,
    pub offset: usize,
    /// Inclusive lower bound on `updated`
    pub updated_since: Option<DateTime<Utc>>,
    pub sort: SortOrder,
}

impl ListQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
            ("sort", self.sort.token()),
        ];
        if let Some(since) = self.updated_since {
            pairs.push((
                "updated_since",
                since.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        pairs
    }
}

/// Paging metadata carried in response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub total_count: Option<usize>,
    pub total_pages: Option<usize>,
    pub current_page: Option<usize>,
}

/// One page of the bookmark list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkPage {
    pub items: Vec<RemoteBookmark>,
    /// Records of this page whose JSON did not fit [`RemoteBookmark`]
    pub rejected: Vec<MappingFailure>,
    pub meta: PageMeta,
}

impl BookmarkPage {
    /// Number of records the server sent, decodable or not.
    pub fn received(&self) -> usize {
        self.items.len() + self.rejected.len()
    }

    /// Whether no further page needs to be requested after this one.
    ///
    /// A short page ends the listing; so do paging headers that say the
    /// last page or the last item has been reached.
    pub fn is_last(&self, query: &ListQuery) -> bool {
        let received = self.received();
        if received < query.limit {
            return true;
        }
        let current = self
            .meta
            .current_page
            .unwrap_or(query.offset / query.limit.max(1) + 1);
        if self.meta.total_pages.is_some_and(|total| current >= total) {
            return true;
        }
        self.meta
            .total_count
            .is_some_and(|total| query.offset + received >= total)
    }
}

/// Decode a list response body one record at a time.
///
/// Records that do not fit [`RemoteBookmark`] come back as failures
/// instead of failing the page; only a body that is not a JSON array is
/// an error.
pub fn decode_records(
    body: &str,
) -> serde_json::Result<(Vec<RemoteBookmark>, Vec<MappingFailure>)> {
    let values = serde_json::from_str::<Vec<serde_json::Value>>(body)?;
    let mut items = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for value in values {
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .and_then(|id| id.parse().ok());
        match serde_json::from_value::<RemoteBookmark>(value) {
            Ok(record) => items.push(record),
            Err(error) => rejected.push(MappingFailure {
                id,
                reason: error.to_string(),
            }),
        }
    }
    Ok((items, rejected))
}

/// Partial edit body; only set fields are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookmarkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_marked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<FieldChange> for BookmarkPatch {
    fn from(change: FieldChange) -> Self {
        match change {
            FieldChange::Favorite(value) => Self {
                is_marked: Some(value),
                ..Self::default()
            },
            FieldChange::Archived(value) => Self {
                is_archived: Some(value),
                ..Self::default()
            },
            FieldChange::ReadProgress(value) => Self {
                read_progress: Some(value.value()),
                ..Self::default()
            },
        }
    }
}

/// Canonical fields echoed back by a successful edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditAck {
    pub id: Option<String>,
    pub href: Option<String>,
    pub updated: Option<String>,
    pub is_marked: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_deleted: Option<bool>,
    pub read_progress: Option<i64>,
    pub read_anchor: Option<String>,
    pub labels: Option<Vec<String>>,
    pub title: Option<String>,
}

impl EditAck {
    /// Move the row's `updated` to the echoed instant if that is newer.
    pub fn advance_updated(&self, bookmark: &mut Bookmark) {
        if let Some(updated) = parse_instant(self.updated.as_deref()) {
            if updated > bookmark.updated {
                bookmark.updated = updated;
            }
        }
    }

    /// Merge the echoed canonical values into a local row.
    ///
    /// Fields with other unacknowledged local edits keep their local value.
    pub fn merge_into(&self, bookmark: &mut Bookmark) {
        self.advance_updated(bookmark);
        let pending = bookmark.pending;
        if let Some(value) = self
            .is_marked
            .filter(|_| !pending.contains(PendingFields::FAVORITE))
        {
            bookmark.is_favorite = value;
        }
        if let Some(value) = self
            .is_archived
            .filter(|_| !pending.contains(PendingFields::ARCHIVED))
        {
            bookmark.is_archived = value;
        }
        if let Some(value) = self.is_deleted {
            bookmark.is_deleted = value;
        }
        if let Some(value) = self
            .read_progress
            .filter(|_| !pending.contains(PendingFields::READ_PROGRESS))
            .and_then(|raw| ReadProgress::new(raw).ok())
        {
            bookmark.read_progress = value;
        }
        if let Some(labels) = &self.labels {
            bookmark.labels.clone_from(labels);
        }
        if let Some(title) = &self.title {
            bookmark.title.clone_from(title);
        }
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateBookmark {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Result of a create request; the server processes the page asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedBookmark {
    pub id: Option<BookmarkId>,
    pub location: Option<String>,
}

/// Login body for the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub application: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("application", &self.application)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthToken {
    #[serde(default)]
    pub id: Option<String>,
    pub token: String,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AuthToken")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub user: ProfileUser,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfileUser {
    pub username: String,
    pub email: String,
}
