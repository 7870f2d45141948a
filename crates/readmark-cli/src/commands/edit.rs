use std::path::Path;

use readmark_core::models::FieldChange;
use readmark_core::sync::{MutationResult, SyncMode};
use tokio_util::sync::CancellationToken;

use crate::commands::common::{parse_bookmark_id, Session};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    change: FieldChange,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let id = parse_bookmark_id(id)?;
    let session = Session::open(db_path, config_path).await?;

    match session.propagator().apply_mutation(&id, change).await? {
        MutationResult::Success => {
            println!("Updated {} for {id}", change.field_name());
            follow_up_sync(&session).await;
            Ok(())
        }
        MutationResult::NetworkError(message) => {
            println!("Saved locally; will be sent on the next sync ({message})");
            Ok(())
        }
        MutationResult::GenericError { message, .. } => Err(CliError::Rejected(message)),
    }
}

/// Pull server-side changes after an accepted edit; failures are logged,
/// not returned.
async fn follow_up_sync(session: &Session) {
    let outcome = session
        .orchestrator()
        .run(SyncMode::Incremental, &CancellationToken::new())
        .await;
    if !outcome.is_success() {
        tracing::warn!("Follow-up sync after edit did not complete: {}", outcome);
    }
}
