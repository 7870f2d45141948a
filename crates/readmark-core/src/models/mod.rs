//! Data models for Readmark

mod bookmark;
mod change;
mod filter;
mod sync_cursor;

pub use bookmark::{
    Bookmark, BookmarkId, ContentType, ImageResource, PendingFields, ReadProgress, Resource,
    Resources,
};
#[cfg(test)]
pub(crate) use bookmark::fixtures;
pub use change::FieldChange;
pub use filter::{BookmarkFilter, ReadState};
pub use sync_cursor::SyncCursor;
