use std::path::Path;

use chrono::{DateTime, Utc};
use readmark_core::models::ReadState;
use readmark_core::sync::{SqliteSyncStateTracker, SyncStateTracker};
use readmark_core::BookmarkFilter;
use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, open_store};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub bookmarks: usize,
    pub unread: usize,
    pub pending_edits: usize,
    pub initial_sync_done: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

pub async fn collect_status(db_path: &Path) -> Result<StatusReport, CliError> {
    let store = open_store(db_path).await?;
    let cursor = SqliteSyncStateTracker::new(store.clone()).load().await?;
    let unread = store
        .query(BookmarkFilter::default().read_state(ReadState::Unread))
        .await?
        .len();

    Ok(StatusReport {
        bookmarks: store.count().await?,
        unread,
        pending_edits: store.list_pending().await?.len(),
        initial_sync_done: cursor.initial_sync_done,
        last_sync: cursor.last_sync,
    })
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let report = collect_status(db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Database:      {}", db_path.display());
    println!("Bookmarks:     {} ({} unread)", report.bookmarks, report.unread);
    println!("Pending edits: {}", report.pending_edits);
    println!("Last sync:     {}", format_sync_timestamp(report.last_sync));
    if !report.initial_sync_done {
        println!("No full sync yet. Run `readmark sync` to fetch your library.");
    }
    Ok(())
}
