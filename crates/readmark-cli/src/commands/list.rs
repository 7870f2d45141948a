use std::path::Path;

use chrono::Utc;

use crate::commands::common::{
    bookmark_to_list_item, build_filter, format_bookmark_lines, open_store, BookmarkListItem,
    ListFlags,
};
use crate::error::CliError;

pub async fn run_list(
    flags: ListFlags,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let bookmarks = store.query(build_filter(flags, limit)).await?;
    let now = Utc::now();

    if as_json {
        let json_items = bookmarks
            .iter()
            .map(|bookmark| bookmark_to_list_item(bookmark, now))
            .collect::<Vec<BookmarkListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if bookmarks.is_empty() {
        println!("No bookmarks found. Run `readmark sync` to fetch your library.");
    } else {
        for line in format_bookmark_lines(&bookmarks, now) {
            println!("{line}");
        }
    }

    Ok(())
}
