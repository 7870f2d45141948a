//! Bookmark synchronization: pulling remote state into the local store,
//! pushing local edits back, and scheduling runs.

mod mutation;
mod orchestrator;
mod reconcile;
mod scheduler;
mod state;

pub use mutation::{MutationPropagator, MutationResult, SyncTrigger, ValidationPolicy};
pub use orchestrator::{SyncMode, SyncOrchestrator, SyncOutcome, SyncPhase};
pub use reconcile::{ReconcileResult, ReconciliationEngine};
pub use scheduler::{NetworkMonitor, RetryPolicy, SyncClass, SyncScheduler};
pub use state::{SqliteSyncStateTracker, SyncStateTracker};
