//! Persisted sync cursor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::SettingsRepository;
use crate::models::SyncCursor;
use crate::services::LocalBookmarkStore;
use crate::util::from_timestamp_millis;
use crate::Result;

const LAST_SYNC_KEY: &str = "sync.last_timestamp";
const INITIAL_SYNC_KEY: &str = "sync.initial_done";

/// Storage for the incremental sync watermark.
#[async_trait]
pub trait SyncStateTracker: Send + Sync {
    async fn load(&self) -> Result<SyncCursor>;

    /// Advance the watermark; an older `timestamp` leaves it unchanged.
    async fn record_sync(&self, timestamp: DateTime<Utc>) -> Result<SyncCursor>;

    async fn mark_initial_sync_done(&self) -> Result<()>;

    /// Forget all sync progress so the next run is a full sync.
    async fn reset(&self) -> Result<()>;
}

/// [`SyncStateTracker`] stored in the local database's settings table.
#[derive(Clone)]
pub struct SqliteSyncStateTracker {
    store: LocalBookmarkStore,
}

impl SqliteSyncStateTracker {
    pub const fn new(store: LocalBookmarkStore) -> Self {
        Self { store }
    }
}

fn read_cursor(settings: &SettingsRepository<'_>) -> Result<SyncCursor> {
    let last_sync = settings
        .get(LAST_SYNC_KEY)?
        .and_then(|raw| raw.parse::<i64>().ok())
        .map(from_timestamp_millis);
    let initial_sync_done = settings
        .get(INITIAL_SYNC_KEY)?
        .is_some_and(|raw| raw == "true");
    Ok(SyncCursor {
        last_sync,
        initial_sync_done,
    })
}

#[async_trait]
impl SyncStateTracker for SqliteSyncStateTracker {
    async fn load(&self) -> Result<SyncCursor> {
        self.store.with_settings(read_cursor).await
    }

    async fn record_sync(&self, timestamp: DateTime<Utc>) -> Result<SyncCursor> {
        self.store
            .with_settings(move |settings| {
                let current = read_cursor(settings)?;
                let advanced = current.advanced_to(timestamp);
                if advanced != current {
                    if let Some(last_sync) = advanced.last_sync {
                        settings.set(LAST_SYNC_KEY, &last_sync.timestamp_millis().to_string())?;
                    }
                }
                Ok(advanced)
            })
            .await
    }

    async fn mark_initial_sync_done(&self) -> Result<()> {
        self.store
            .with_settings(|settings| settings.set(INITIAL_SYNC_KEY, "true"))
            .await
    }

    async fn reset(&self) -> Result<()> {
        self.store
            .with_settings(|settings| {
                settings.remove(LAST_SYNC_KEY)?;
                settings.remove(INITIAL_SYNC_KEY)
            })
            .await
    }
}
