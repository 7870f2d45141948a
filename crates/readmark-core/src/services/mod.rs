//! Async services over the local database.

mod article;
mod store;

pub use article::ArticleLoader;
pub use store::{LocalBookmarkStore, QuerySubscription};
