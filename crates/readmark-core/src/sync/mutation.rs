//! Optimistic local edits pushed to the server.

use std::sync::Arc;

use crate::models::{Bookmark, BookmarkId, FieldChange};
use crate::remote::{ApiError, BookmarkPatch, EditAck, RemoteBookmarkClient};
use crate::services::LocalBookmarkStore;
use crate::Result;

/// Something that can start a follow-up sync without waiting for it.
pub trait SyncTrigger: Send + Sync {
    fn request_sync(&self);
}

/// What to do with the optimistic write when the server rejects the edit
/// with a validation error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Leave the requested value in place locally
    #[default]
    KeepOptimistic,
    /// Restore the value the field had before the edit
    Rollback,
}

/// Result of propagating one edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationResult {
    Success,
    /// The server refused the edit; `code` is the HTTP status when known
    GenericError { message: String, code: Option<u16> },
    /// The server could not be reached; the edit stays pending
    NetworkError(String),
}

impl MutationResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Applies single-field edits locally, then sends them as partial patches.
#[derive(Clone)]
pub struct MutationPropagator {
    store: LocalBookmarkStore,
    remote: Arc<dyn RemoteBookmarkClient>,
    trigger: Option<Arc<dyn SyncTrigger>>,
    policy: ValidationPolicy,
}

impl MutationPropagator {
    pub fn new(store: LocalBookmarkStore, remote: Arc<dyn RemoteBookmarkClient>) -> Self {
        Self {
            store,
            remote,
            trigger: None,
            policy: ValidationPolicy::default(),
        }
    }

    /// Request a follow-up sync after every accepted edit.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Arc<dyn SyncTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub const fn with_validation_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write `change` locally, then send it to the server.
    ///
    /// The local row reflects the change before any network call. Only local
    /// store failures (including an unknown id) are returned as `Err`.
    pub async fn apply_mutation(
        &self,
        id: &BookmarkId,
        change: FieldChange,
    ) -> Result<MutationResult> {
        let (_, previous) = self
            .store
            .update_with(id, move |row| {
                let previous = row.current_value(change);
                row.apply_change(change);
                previous
            })
            .await?;
        tracing::debug!("Applied {} locally for {}", change.field_name(), id);

        let result = self.push(id, change, previous).await?;
        if result.is_success() {
            if let Some(trigger) = &self.trigger {
                trigger.request_sync();
            }
        }
        Ok(result)
    }

    /// Re-send every unacknowledged local edit.
    ///
    /// Stops at the first network failure. Returns how many edits the server
    /// accepted.
    pub async fn retry_pending(&self) -> Result<usize> {
        let mut accepted = 0;
        for row in self.store.list_pending().await? {
            for change in row.pending_changes() {
                match self.push(&row.id, change, change).await? {
                    MutationResult::Success => accepted += 1,
                    MutationResult::NetworkError(message) => {
                        tracing::debug!("Pending edits stay queued: {}", message);
                        return Ok(accepted);
                    }
                    MutationResult::GenericError { message, .. } => {
                        tracing::warn!(
                            "Server refused pending {} for {}: {}",
                            change.field_name(),
                            row.id,
                            message
                        );
                    }
                }
            }
        }
        Ok(accepted)
    }

    async fn push(
        &self,
        id: &BookmarkId,
        change: FieldChange,
        previous: FieldChange,
    ) -> Result<MutationResult> {
        let patch = BookmarkPatch::from(change);
        match self.remote.edit_bookmark(id, &patch).await {
            Ok(ack) => {
                self.acknowledge(id, change, ack).await?;
                Ok(MutationResult::Success)
            }
            Err(ApiError::Validation(message)) => {
                tracing::warn!(
                    "Server rejected {} for {}: {}",
                    change.field_name(),
                    id,
                    message
                );
                let restore = match self.policy {
                    ValidationPolicy::KeepOptimistic => None,
                    ValidationPolicy::Rollback => Some(previous),
                };
                self.settle(id, change, restore).await?;
                Ok(MutationResult::GenericError {
                    message,
                    code: Some(422),
                })
            }
            Err(ApiError::Network(message)) => {
                tracing::warn!(
                    "Could not send {} for {}: {}",
                    change.field_name(),
                    id,
                    message
                );
                Ok(MutationResult::NetworkError(message))
            }
            Err(ApiError::Server { message, code }) => {
                // 4xx will fail the same way on every retry
                if (400..500).contains(&code) {
                    self.settle(id, change, None).await?;
                }
                Ok(MutationResult::GenericError {
                    message,
                    code: Some(code),
                })
            }
            Err(ApiError::Decode(message)) => Ok(MutationResult::GenericError {
                message,
                code: None,
            }),
        }
    }

    /// Merge the server's canonical fields and clear the pending flag,
    /// unless a newer local edit of the same field superseded this one.
    async fn acknowledge(
        &self,
        id: &BookmarkId,
        change: FieldChange,
        ack: EditAck,
    ) -> Result<()> {
        self.store
            .update_with(id, move |row| {
                if row.current_value(change) == change {
                    row.pending = row.pending.without(change.pending_flag());
                    ack.merge_into(row);
                } else {
                    ack.advance_updated(row);
                }
            })
            .await?;
        Ok(())
    }

    /// Stop retrying a refused edit, optionally restoring the old value.
    async fn settle(
        &self,
        id: &BookmarkId,
        change: FieldChange,
        restore: Option<FieldChange>,
    ) -> Result<()> {
        self.store
            .update_with(id, move |row: &mut Bookmark| {
                if row.current_value(change) != change {
                    return;
                }
                if let Some(previous) = restore {
                    row.apply_change(previous);
                }
                row.pending = row.pending.without(change.pending_flag());
            })
            .await?;
        Ok(())
    }
}
