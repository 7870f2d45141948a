//! Bookmark model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, server-assigned bookmark identifier.
///
/// This is the sole join key between remote and local records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BookmarkId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput(
                "bookmark id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Kind of document a bookmark points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Article,
    Picture,
    Video,
}

impl ContentType {
    /// Stable storage name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Picture => "picture",
            Self::Video => "video",
        }
    }
}

impl FromStr for ContentType {
    type Err = crate::Error;

    /// Accepts the storage names plus the server's `photo` alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "article" => Ok(Self::Article),
            "picture" | "photo" => Ok(Self::Picture),
            "video" => Ok(Self::Video),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown content type '{other}'"
            ))),
        }
    }
}

/// Reading progress percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReadProgress(u8);

impl ReadProgress {
    pub const UNREAD: Self = Self(0);
    pub const READ: Self = Self(100);

    pub fn new(value: i64) -> crate::Result<Self> {
        u8::try_from(value)
            .ok()
            .filter(|value| *value <= 100)
            .map(Self)
            .ok_or_else(|| {
                crate::Error::InvalidInput(format!("read progress {value} is outside 0..=100"))
            })
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_read(self) -> bool {
        self.0 == 100
    }
}

impl<'de> Deserialize<'de> for ReadProgress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Non-image sub-resource (e.g. the article body endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub src: String,
}

/// Image sub-resource with its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// The four sub-resources a bookmark may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub article: Option<Resource>,
    pub icon: Option<ImageResource>,
    pub image: Option<ImageResource>,
    pub thumbnail: Option<ImageResource>,
}

/// Bitmask of locally edited fields the server has not acknowledged yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingFields(u8);

impl PendingFields {
    pub const NONE: Self = Self(0);
    pub const FAVORITE: Self = Self(1);
    pub const ARCHIVED: Self = Self(1 << 1);
    pub const READ_PROGRESS: Self = Self(1 << 2);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// A bookmark mirrored from the remote server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Server-assigned identifier
    pub id: BookmarkId,
    /// API href of the bookmark itself
    pub href: String,
    /// Bookmarked page URL
    pub url: String,
    pub title: String,
    pub site_name: String,
    pub site: String,
    pub description: String,
    pub authors: Vec<String>,
    pub lang: String,
    pub text_direction: String,
    pub document_type: String,
    pub content_type: ContentType,
    pub has_article: bool,
    pub is_deleted: bool,
    pub is_favorite: bool,
    pub is_archived: bool,
    /// Labels as received; compared as an unordered set
    pub labels: Vec<String>,
    pub read_progress: ReadProgress,
    pub word_count: Option<u32>,
    /// Estimated reading time in minutes
    pub reading_time: Option<u32>,
    pub resources: Resources,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Locally cached article HTML, never part of list payloads
    pub article_content: Option<String>,
    /// Local edits not yet acknowledged by the server
    #[serde(skip)]
    pub pending: PendingFields,
}

impl Bookmark {
    /// Whether the bookmark has been fully read.
    pub const fn is_read(&self) -> bool {
        self.read_progress.is_read()
    }

    /// Compare the server-owned state of two bookmarks.
    ///
    /// Ignores the cached article body and the pending-edit bitmask, and
    /// treats labels as an unordered set.
    pub fn same_remote_state(&self, other: &Self) -> bool {
        let mut left_labels = self.labels.clone();
        let mut right_labels = other.labels.clone();
        left_labels.sort();
        right_labels.sort();

        left_labels == right_labels
            && Self {
                labels: Vec::new(),
                article_content: None,
                pending: PendingFields::NONE,
                ..self.clone()
            } == Self {
                labels: Vec::new(),
                article_content: None,
                pending: PendingFields::NONE,
                ..other.clone()
            }
    }

    /// Apply a local edit to this bookmark and flag it as pending.
    pub fn apply_change(&mut self, change: super::FieldChange) {
        match change {
            super::FieldChange::Favorite(value) => self.is_favorite = value,
            super::FieldChange::Archived(value) => self.is_archived = value,
            super::FieldChange::ReadProgress(value) => self.read_progress = value,
        }
        self.pending = self.pending.with(change.pending_flag());
    }

    /// Local edits the server has not acknowledged yet, with their current values.
    pub fn pending_changes(&self) -> Vec<super::FieldChange> {
        [
            (PendingFields::FAVORITE, super::FieldChange::Favorite(self.is_favorite)),
            (PendingFields::ARCHIVED, super::FieldChange::Archived(self.is_archived)),
            (
                PendingFields::READ_PROGRESS,
                super::FieldChange::ReadProgress(self.read_progress),
            ),
        ]
        .into_iter()
        .filter(|(flag, _)| self.pending.contains(*flag))
        .map(|(_, change)| change)
        .collect()
    }

    /// Current value of the field a change targets.
    pub const fn current_value(&self, change: super::FieldChange) -> super::FieldChange {
        match change {
            super::FieldChange::Favorite(_) => super::FieldChange::Favorite(self.is_favorite),
            super::FieldChange::Archived(_) => super::FieldChange::Archived(self.is_archived),
            super::FieldChange::ReadProgress(_) => {
                super::FieldChange::ReadProgress(self.read_progress)
            }
        }
    }
}
