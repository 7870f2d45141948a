//! Remote bookmark server API: client trait, HTTP implementation and wire types.

pub mod client;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod types;

pub use client::{HttpBookmarkClient, RemoteBookmarkClient};
pub use error::{classify_error_response, ApiError, ApiResult, EMPTY_ERROR_BODY};
pub use types::{
    AuthToken, BookmarkPage, BookmarkPatch, CreateBookmark, CreatedBookmark, Credentials,
    EditAck, ListQuery, MappingFailure, PageMeta, RemoteBookmark, SortField, SortOrder,
    UserProfile,
};
