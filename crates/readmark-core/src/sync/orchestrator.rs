//! Paginated full and incremental sync runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::mutation::MutationPropagator;
use super::reconcile::{ReconcileResult, ReconciliationEngine};
use super::state::SyncStateTracker;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::models::SyncCursor;
use crate::remote::{
    ApiError, BookmarkPage, ListQuery, RemoteBookmarkClient, SortField, SortOrder,
};
use crate::Error;

pub(crate) const CANCELLED_MESSAGE: &str = "sync cancelled";

/// Scope of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Only records updated since the stored cursor; never deletes
    Incremental,
    /// The whole remote set; the only mode that deletes local rows
    Full,
}

/// Final classification of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success {
        inserted: usize,
        updated: usize,
        deleted: usize,
    },
    /// Transient failure; retrying later may succeed
    NetworkError(String),
    /// Non-transient failure; retrying blindly will not help
    Error(String),
}

impl SyncOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                inserted,
                updated,
                deleted,
            } => write!(
                f,
                "synced: {inserted} inserted, {updated} updated, {deleted} deleted"
            ),
            Self::NetworkError(message) => write!(f, "network error: {message}"),
            Self::Error(message) => write!(f, "sync failed: {message}"),
        }
    }
}

/// Progress of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    /// Re-sending unacknowledged local edits
    PushingPending,
    Fetching { page: usize },
    Reconciling { page: usize },
    Completed,
    Failed,
}

enum RunError {
    Remote(ApiError),
    Local(Error),
    Cancelled,
    /// A page held only records already received during this run
    Stalled { page: usize },
}

impl From<ApiError> for RunError {
    fn from(error: ApiError) -> Self {
        Self::Remote(error)
    }
}

impl From<Error> for RunError {
    fn from(error: Error) -> Self {
        match error {
            Error::Remote(api) => Self::Remote(api),
            other => Self::Local(other),
        }
    }
}

impl From<RunError> for SyncOutcome {
    fn from(error: RunError) -> Self {
        match error {
            RunError::Remote(error) if error.is_transient() => {
                Self::NetworkError(error.message().to_string())
            }
            RunError::Remote(error) => Self::Error(error.to_string()),
            RunError::Local(error) => Self::Error(error.to_string()),
            RunError::Cancelled => Self::NetworkError(CANCELLED_MESSAGE.to_string()),
            RunError::Stalled { page } => Self::Error(format!(
                "server sent no new bookmarks on page {page}, paging stopped"
            )),
        }
    }
}

#[derive(Default)]
struct Totals {
    inserted: usize,
    updated: usize,
    deleted: usize,
}

impl Totals {
    fn add(&mut self, result: &ReconcileResult) {
        self.inserted += result.inserted;
        self.updated += result.updated;
        self.deleted += result.deleted;
    }
}

/// Bookmark ids received so far in one run.
///
/// Guards paging against servers that ignore `offset` and keep sending the
/// same page.
#[derive(Default)]
struct SeenIds(HashSet<String>);

impl SeenIds {
    /// Record the page's ids; `false` when a non-empty page brought no new one.
    fn admit(&mut self, page: &BookmarkPage) -> bool {
        let ids = page
            .items
            .iter()
            .filter_map(|record| record.id.clone())
            .chain(
                page.rejected
                    .iter()
                    .filter_map(|failure| failure.id.as_ref().map(ToString::to_string)),
            )
            .collect::<Vec<_>>();
        let mut fresh = false;
        for id in ids {
            fresh |= self.0.insert(id);
        }
        fresh || page.received() == 0
    }
}

/// Drives sync runs: pages from the remote client into reconciliation,
/// then advances the cursor.
pub struct SyncOrchestrator {
    remote: Arc<dyn RemoteBookmarkClient>,
    engine: ReconciliationEngine,
    state: Arc<dyn SyncStateTracker>,
    pending: Option<MutationPropagator>,
    page_size: usize,
    run_lock: Mutex<()>,
    phase: watch::Sender<SyncPhase>,
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteBookmarkClient>,
        engine: ReconciliationEngine,
        state: Arc<dyn SyncStateTracker>,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            remote,
            engine,
            state,
            pending: None,
            page_size: DEFAULT_PAGE_SIZE,
            run_lock: Mutex::new(()),
            phase,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Re-send unacknowledged local edits before each pull.
    #[must_use]
    pub fn with_pending_push(mut self, propagator: MutationPropagator) -> Self {
        self.pending = Some(propagator);
        self
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub async fn cursor(&self) -> crate::Result<SyncCursor> {
        self.state.load().await
    }

    /// Run one sync to completion.
    ///
    /// Runs are serialized. The first sync is always full regardless of
    /// `mode`. Cancellation abandons the run; pages already reconciled by an
    /// incremental run stay committed.
    pub async fn run(&self, mode: SyncMode, cancel: &CancellationToken) -> SyncOutcome {
        let _running = self.run_lock.lock().await;

        let outcome = match self.run_locked(mode, cancel).await {
            Ok(totals) => SyncOutcome::Success {
                inserted: totals.inserted,
                updated: totals.updated,
                deleted: totals.deleted,
            },
            Err(error) => SyncOutcome::from(error),
        };

        match &outcome {
            SyncOutcome::Success { .. } => {
                self.phase.send_replace(SyncPhase::Completed);
                tracing::info!("Bookmark sync finished, {}", outcome);
            }
            SyncOutcome::NetworkError(message) => {
                self.phase.send_replace(SyncPhase::Failed);
                tracing::warn!("Bookmark sync interrupted: {}", message);
            }
            SyncOutcome::Error(message) => {
                self.phase.send_replace(SyncPhase::Failed);
                tracing::error!("Bookmark sync failed: {}", message);
            }
        }
        outcome
    }

    async fn run_locked(
        &self,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> Result<Totals, RunError> {
        let cursor = self.state.load().await?;
        let full = mode == SyncMode::Full || !cursor.initial_sync_done;
        tracing::info!(
            "Starting {} bookmark sync",
            if full { "full" } else { "incremental" }
        );

        if let Some(propagator) = &self.pending {
            self.phase.send_replace(SyncPhase::PushingPending);
            match propagator.retry_pending().await {
                Ok(0) => {}
                Ok(sent) => tracing::info!("Re-sent {} pending bookmark edits", sent),
                Err(error) => tracing::warn!("Failed to re-send pending edits: {}", error),
            }
        }

        if full {
            self.full_sync(cancel).await
        } else {
            self.incremental_sync(cursor, cancel).await
        }
    }

    async fn incremental_sync(
        &self,
        cursor: SyncCursor,
        cancel: &CancellationToken,
    ) -> Result<Totals, RunError> {
        let mut totals = Totals::default();
        let mut latest = None;
        let mut seen = SeenIds::default();

        for page in 0.. {
            let query = self.page_query(page, cursor.last_sync, SortField::Updated);
            let fetched = self.fetch_page(page, &query, cancel).await?;
            if !seen.admit(&fetched) {
                return Err(RunError::Stalled { page });
            }
            let last = fetched.is_last(&query);

            self.phase.send_replace(SyncPhase::Reconciling { page });
            let result = self
                .engine
                .reconcile_with_rejected(fetched.items, fetched.rejected, false)
                .await?;
            totals.add(&result);
            latest = latest.max(result.latest_updated);
            if last {
                break;
            }
        }

        if let Some(latest) = latest {
            let advanced = self.state.record_sync(latest).await?;
            tracing::debug!("Sync cursor at {:?}", advanced.last_sync);
        }
        Ok(totals)
    }

    async fn full_sync(&self, cancel: &CancellationToken) -> Result<Totals, RunError> {
        let mut accumulated = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = SeenIds::default();
        let mut pages = 0;

        for page in 0.. {
            let query = self.page_query(page, None, SortField::Created);
            let fetched = self.fetch_page(page, &query, cancel).await?;
            if !seen.admit(&fetched) {
                return Err(RunError::Stalled { page });
            }
            let last = fetched.is_last(&query);
            accumulated.extend(fetched.items);
            rejected.extend(fetched.rejected);
            pages = page + 1;
            if last {
                break;
            }
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        self.phase.send_replace(SyncPhase::Reconciling { page: pages });
        tracing::debug!(
            "Fetched {} remote bookmarks over {} pages",
            accumulated.len(),
            pages
        );
        let result = self
            .engine
            .reconcile_with_rejected(accumulated, rejected, true)
            .await?;

        if let Some(latest) = result.latest_updated {
            self.state.record_sync(latest).await?;
        }
        self.state.mark_initial_sync_done().await?;

        let mut totals = Totals::default();
        totals.add(&result);
        Ok(totals)
    }

    fn page_query(
        &self,
        page: usize,
        updated_since: Option<chrono::DateTime<chrono::Utc>>,
        field: SortField,
    ) -> ListQuery {
        ListQuery {
            limit: self.page_size,
            offset: page * self.page_size,
            updated_since,
            sort: SortOrder::ascending(field),
        }
    }

    async fn fetch_page(
        &self,
        page: usize,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> Result<BookmarkPage, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        self.phase.send_replace(SyncPhase::Fetching { page });
        tracing::debug!("Fetching bookmark page {} (offset {})", page, query.offset);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RunError::Cancelled),
            fetched = self.remote.list_bookmarks(query) => fetched.map_err(RunError::from),
        }
    }
}
