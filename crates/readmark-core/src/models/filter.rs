//! Bookmark query filter

use serde::{Deserialize, Serialize};

use super::ContentType;

/// Read state criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadState {
    Unread,
    Read,
}

/// Optional, independently combinable criteria joined with AND.
///
/// An empty filter matches every non-deleted bookmark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkFilter {
    pub content_type: Option<ContentType>,
    pub read_state: Option<ReadState>,
    pub archived: Option<bool>,
    pub favorite: Option<bool>,
    pub limit: Option<usize>,
}

impl BookmarkFilter {
    #[must_use]
    pub const fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    #[must_use]
    pub const fn read_state(mut self, read_state: ReadState) -> Self {
        self.read_state = Some(read_state);
        self
    }

    #[must_use]
    pub const fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    #[must_use]
    pub const fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
