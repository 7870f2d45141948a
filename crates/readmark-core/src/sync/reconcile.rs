//! Merging remote bookmark batches into the local store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::db::BookmarkRepository;
use crate::models::{Bookmark, BookmarkId, PendingFields};
use crate::remote::{MappingFailure, RemoteBookmark};
use crate::services::LocalBookmarkStore;
use crate::Result;

/// Counts produced by one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Records skipped because they could not be mapped
    pub failures: Vec<MappingFailure>,
    /// Greatest `updated` among the mapped records
    pub latest_updated: Option<DateTime<Utc>>,
}

impl ReconcileResult {
    pub const fn changed(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Merge {
    Insert(Bookmark),
    Update(Bookmark),
    Unchanged,
}

/// Decide what a single incoming record does to the stored row.
fn merge(stored: Option<Bookmark>, mut incoming: Bookmark) -> Merge {
    let Some(stored) = stored else {
        return Merge::Insert(incoming);
    };
    if incoming.updated < stored.updated {
        return Merge::Unchanged;
    }

    if incoming.has_article {
        incoming.article_content.clone_from(&stored.article_content);
    }

    if !stored.pending.is_empty() {
        keep_pending_values(&stored, &mut incoming);
    }

    if incoming.same_remote_state(&stored)
        && incoming.pending == stored.pending
        && incoming.article_content == stored.article_content
    {
        Merge::Unchanged
    } else {
        Merge::Update(incoming)
    }
}

/// Carry unsent local edits over an incoming record, whatever its age.
///
/// A field stops being pending only once the server already holds the
/// local value.
fn keep_pending_values(stored: &Bookmark, incoming: &mut Bookmark) {
    let mut pending = PendingFields::NONE;
    if stored.pending.contains(PendingFields::FAVORITE)
        && incoming.is_favorite != stored.is_favorite
    {
        incoming.is_favorite = stored.is_favorite;
        pending = pending.with(PendingFields::FAVORITE);
    }
    if stored.pending.contains(PendingFields::ARCHIVED)
        && incoming.is_archived != stored.is_archived
    {
        incoming.is_archived = stored.is_archived;
        pending = pending.with(PendingFields::ARCHIVED);
    }
    if stored.pending.contains(PendingFields::READ_PROGRESS)
        && incoming.read_progress != stored.read_progress
    {
        incoming.read_progress = stored.read_progress;
        pending = pending.with(PendingFields::READ_PROGRESS);
    }
    incoming.pending = pending;
}

/// Applies remote batches to a [`LocalBookmarkStore`].
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: LocalBookmarkStore,
}

impl ReconciliationEngine {
    pub const fn new(store: LocalBookmarkStore) -> Self {
        Self { store }
    }

    /// Upsert every record of `batch`.
    ///
    /// With `full_sync` the batch must be the complete remote set: local rows
    /// whose id it does not contain are deleted. Partial batches never delete.
    pub async fn reconcile(
        &self,
        batch: Vec<RemoteBookmark>,
        full_sync: bool,
    ) -> Result<ReconcileResult> {
        self.reconcile_with_rejected(batch, Vec::new(), full_sync)
            .await
    }

    /// [`Self::reconcile`] for a batch some of whose records already failed
    /// to decode.
    ///
    /// `rejected` records are reported as failures and, like records that
    /// fail mapping, keep their local row through a full sync.
    pub async fn reconcile_with_rejected(
        &self,
        batch: Vec<RemoteBookmark>,
        rejected: Vec<MappingFailure>,
        full_sync: bool,
    ) -> Result<ReconcileResult> {
        let mut remote_ids = HashSet::with_capacity(batch.len() + rejected.len());
        let mut failures = Vec::new();
        let mut mapped = Vec::with_capacity(batch.len());

        let records = batch
            .into_iter()
            .map(Bookmark::try_from)
            .chain(rejected.into_iter().map(Err));
        for record in records {
            match record {
                Ok(bookmark) => {
                    remote_ids.insert(bookmark.id.clone());
                    mapped.push(bookmark);
                }
                Err(failure) => {
                    tracing::warn!(
                        "Skipping malformed remote bookmark {}: {}",
                        failure.id.as_ref().map_or("<no id>", BookmarkId::as_str),
                        failure.reason
                    );
                    if let Some(id) = &failure.id {
                        remote_ids.insert(id.clone());
                    }
                    failures.push(failure);
                }
            }
        }
        let latest_updated = mapped.iter().map(|bookmark| bookmark.updated).max();

        let (inserted, updated, deleted) = self
            .store
            .transaction(move |repo| {
                let mut inserted = 0;
                let mut updated = 0;
                for incoming in mapped {
                    let stored = repo.get(&incoming.id)?;
                    match merge(stored, incoming) {
                        Merge::Insert(row) => {
                            repo.upsert(&row)?;
                            inserted += 1;
                        }
                        Merge::Update(row) => {
                            repo.upsert(&row)?;
                            updated += 1;
                        }
                        Merge::Unchanged => {}
                    }
                }

                let deleted = if full_sync {
                    let stale = repo
                        .list_ids()?
                        .into_iter()
                        .filter(|id| !remote_ids.contains(id))
                        .collect::<Vec<_>>();
                    repo.delete_ids(&stale)?
                } else {
                    0
                };
                Ok((inserted, updated, deleted))
            })
            .await?;

        let result = ReconcileResult {
            inserted,
            updated,
            deleted,
            failures,
            latest_updated,
        };
        if result.changed() {
            self.store.notify_changed();
        }
        tracing::debug!(
            "Reconciled batch (full: {}): {} inserted, {} updated, {} deleted, {} skipped",
            full_sync,
            result.inserted,
            result.updated,
            result.deleted,
            result.failures.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::bookmark;
    use crate::models::{FieldChange, ReadProgress};
    use crate::BookmarkFilter;
    use pretty_assertions::assert_eq;

    fn remote(id: &str, updated_secs: i64) -> RemoteBookmark {
        let updated = DateTime::from_timestamp(updated_secs, 0).unwrap();
        RemoteBookmark {
            id: Some(id.to_string()),
            title: Some(format!("Remote {id}")),
            has_article: true,
            updated: Some(updated.to_rfc3339()),
            ..RemoteBookmark::default()
        }
    }

    async fn engine() -> (ReconciliationEngine, LocalBookmarkStore) {
        let store = LocalBookmarkStore::open_in_memory().await.unwrap();
        (ReconciliationEngine::new(store.clone()), store)
    }

    async fn ids(store: &LocalBookmarkStore) -> Vec<String> {
        let mut ids = store
            .query(BookmarkFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id.to_string())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    #[test]
    fn merge_keeps_pending_values_on_equal_timestamp() {
        let mut stored = bookmark("a", 10);
        stored.apply_change(FieldChange::Favorite(true));
        let incoming = bookmark("a", 10);

        assert_eq!(merge(Some(stored), incoming), Merge::Unchanged);
    }

    #[test]
    fn merge_keeps_pending_edit_over_newer_remote() {
        let mut stored = bookmark("a", 10);
        stored.apply_change(FieldChange::ReadProgress(ReadProgress::READ));
        let mut incoming = bookmark("a", 11);
        incoming.title = "Renamed elsewhere".to_string();

        let Merge::Update(row) = merge(Some(stored), incoming) else {
            panic!("newer remote record should update the row");
        };
        assert_eq!(row.title, "Renamed elsewhere");
        assert_eq!(row.updated, DateTime::from_timestamp(11, 0).unwrap());
        assert_eq!(row.read_progress, ReadProgress::READ);
        assert!(row.pending.contains(PendingFields::READ_PROGRESS));
    }

    #[test]
    fn merge_clears_pending_once_remote_holds_local_value() {
        let mut stored = bookmark("a", 10);
        stored.apply_change(FieldChange::Favorite(true));
        stored.apply_change(FieldChange::Archived(true));
        let mut incoming = bookmark("a", 11);
        incoming.is_favorite = true;

        let Merge::Update(row) = merge(Some(stored), incoming) else {
            panic!("expected update");
        };
        assert!(row.is_favorite);
        assert!(row.is_archived);
        assert!(!row.pending.contains(PendingFields::FAVORITE));
        assert!(row.pending.contains(PendingFields::ARCHIVED));
    }

    #[test]
    fn merge_ignores_older_records_and_keeps_article() {
        let mut stored = bookmark("a", 10);
        stored.article_content = Some("<p>cached</p>".to_string());

        assert_eq!(merge(Some(stored.clone()), bookmark("a", 9)), Merge::Unchanged);

        let mut incoming = bookmark("a", 12);
        incoming.title = "Renamed".to_string();
        let Merge::Update(row) = merge(Some(stored), incoming) else {
            panic!("expected update");
        };
        assert_eq!(row.article_content.as_deref(), Some("<p>cached</p>"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_sync_deletes_rows_missing_remotely() {
        let (engine, store) = engine().await;
        engine
            .reconcile(
                vec![remote("A", 1), remote("B", 2), remote("C", 3), remote("D", 4)],
                false,
            )
            .await
            .unwrap();

        let result = engine
            .reconcile(vec![remote("A", 1), remote("B", 2), remote("C", 3)], true)
            .await
            .unwrap();

        assert_eq!(result.deleted, 1);
        assert_eq!((result.inserted, result.updated), (0, 0));
        assert_eq!(ids(&store).await, vec!["A", "B", "C"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn incremental_never_deletes() {
        let (engine, store) = engine().await;
        engine
            .reconcile(vec![remote("A", 1), remote("B", 2)], false)
            .await
            .unwrap();

        let result = engine.reconcile(vec![remote("A", 5)], false).await.unwrap();

        assert_eq!(result.deleted, 0);
        assert_eq!(result.updated, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconcile_is_idempotent() {
        let (engine, store) = engine().await;
        let batch = vec![remote("A", 1), remote("B", 2)];

        let first = engine.reconcile(batch.clone(), true).await.unwrap();
        let snapshot = store.query(BookmarkFilter::default()).await.unwrap();
        let second = engine.reconcile(batch, true).await.unwrap();

        assert_eq!((first.inserted, first.updated), (2, 0));
        assert_eq!((second.inserted, second.updated, second.deleted), (0, 0, 0));
        assert_eq!(store.query(BookmarkFilter::default()).await.unwrap(), snapshot);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_records_are_skipped_but_protect_their_rows() {
        let (engine, store) = engine().await;
        engine
            .reconcile(vec![remote("A", 1), remote("B", 2)], true)
            .await
            .unwrap();

        let mut broken = remote("B", 3);
        broken.read_progress = Some(250);
        let mut anonymous = remote("x", 3);
        anonymous.id = None;

        let result = engine
            .reconcile(vec![remote("A", 1), broken, anonymous], true)
            .await
            .unwrap();

        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.deleted, 0);
        assert_eq!(ids(&store).await, vec!["A", "B"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_remote_record_keeps_unsent_favorite() {
        let (engine, store) = engine().await;
        engine.reconcile(vec![remote("A", 10)], true).await.unwrap();
        let id = "A".parse::<BookmarkId>().unwrap();
        store
            .update_with(&id, |row| row.apply_change(FieldChange::Favorite(true)))
            .await
            .unwrap();

        let mut renamed = remote("A", 20);
        renamed.title = Some("Renamed".to_string());
        let result = engine.reconcile(vec![renamed], false).await.unwrap();

        assert_eq!(result.updated, 1);
        let row = store.get(&id).await.unwrap().unwrap();
        assert_eq!(row.title, "Renamed");
        assert!(row.is_favorite);
        assert!(row.pending.contains(PendingFields::FAVORITE));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_records_count_as_failures_and_are_not_deleted() {
        let (engine, store) = engine().await;
        engine
            .reconcile(vec![remote("A", 1), remote("B", 2)], true)
            .await
            .unwrap();

        let rejected = vec![MappingFailure {
            id: Some("B".parse().unwrap()),
            reason: "invalid type: string \"many\", expected u32".to_string(),
        }];
        let result = engine
            .reconcile_with_rejected(vec![remote("A", 1)], rejected, true)
            .await
            .unwrap();

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.deleted, 0);
        assert_eq!(ids(&store).await, vec!["A", "B"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reports_latest_updated() {
        let (engine, _) = engine().await;
        let result = engine
            .reconcile(vec![remote("A", 30), remote("B", 10)], false)
            .await
            .unwrap();
        assert_eq!(result.latest_updated, DateTime::from_timestamp(30, 0));
    }
}
