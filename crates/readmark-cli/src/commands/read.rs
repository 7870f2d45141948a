use std::path::Path;

use readmark_core::services::ArticleLoader;

use crate::commands::common::{connect_remote, open_store, parse_bookmark_id};
use crate::config::load_config;
use crate::error::CliError;

/// Print the article body, reading from the local cache when possible so
/// cached articles stay readable offline.
pub async fn run_read(id: &str, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let id = parse_bookmark_id(id)?;
    let store = open_store(db_path).await?;

    let bookmark = store
        .get(&id)
        .await?
        .ok_or_else(|| CliError::BookmarkNotFound(id.to_string()))?;
    if let Some(content) = bookmark.article_content {
        println!("{content}");
        return Ok(());
    }

    let remote = connect_remote(&load_config(config_path)?)?;
    let content = ArticleLoader::new(store, remote).load(&id).await?;
    println!("{content}");
    Ok(())
}
