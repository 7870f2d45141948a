//! Sync cursor model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted watermark controlling the scope of incremental sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Maximum remote `updated` instant reconciled by a completed sync
    pub last_sync: Option<DateTime<Utc>>,
    /// Whether a full sync has completed at least once
    pub initial_sync_done: bool,
}

impl SyncCursor {
    /// Returns the cursor advanced to `candidate`, never moving backwards.
    #[must_use]
    pub fn advanced_to(self, candidate: DateTime<Utc>) -> Self {
        let last_sync = match self.last_sync {
            Some(current) if current >= candidate => Some(current),
            _ => Some(candidate),
        };
        Self { last_sync, ..self }
    }
}
