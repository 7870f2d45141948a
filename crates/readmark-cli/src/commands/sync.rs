use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use readmark_core::config::MIN_SYNC_INTERVAL_MINS;
use readmark_core::sync::{
    NetworkMonitor, RetryPolicy, SyncClass, SyncMode, SyncOutcome, SyncScheduler,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_sync(full: bool, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let session = Session::open(db_path, config_path).await?;
    let orchestrator = session.orchestrator();
    let mode = if full {
        SyncMode::Full
    } else {
        SyncMode::Incremental
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let outcome = orchestrator.run(mode, &cancel).await;
    interrupt.abort();

    report_outcome(&outcome)
}

pub fn report_outcome(outcome: &SyncOutcome) -> Result<(), CliError> {
    if outcome.is_success() {
        println!("Sync completed: {outcome}");
        Ok(())
    } else {
        Err(CliError::Sync(outcome.to_string()))
    }
}

pub fn resolve_interval(
    interval_mins: Option<u64>,
    configured: Duration,
) -> Result<Duration, CliError> {
    match interval_mins {
        None => Ok(configured),
        Some(minutes) if minutes < MIN_SYNC_INTERVAL_MINS => Err(CliError::Config(format!(
            "--interval-mins must be at least {MIN_SYNC_INTERVAL_MINS}"
        ))),
        Some(minutes) => Ok(Duration::from_secs(minutes * 60)),
    }
}

pub async fn run_watch(
    interval_mins: Option<u64>,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let session = Session::open(db_path, config_path).await?;
    let interval = resolve_interval(interval_mins, session.config.sync_interval())?;
    let scheduler = SyncScheduler::new(
        Arc::new(session.orchestrator()),
        NetworkMonitor::always_connected(),
        RetryPolicy::from(session.config.retry),
    );
    let mut manual = scheduler.subscribe_outcome(SyncClass::Manual);
    let mut periodic = scheduler.subscribe_outcome(SyncClass::Auto);

    drop(scheduler.run_now(SyncMode::Incremental));
    scheduler.schedule_periodic(interval);
    println!(
        "Syncing every {} minutes, press Ctrl-C to stop",
        interval.as_secs() / 60
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = manual.changed() => {
                if changed.is_err() {
                    break;
                }
                print_latest(&mut manual);
            }
            changed = periodic.changed() => {
                if changed.is_err() {
                    break;
                }
                print_latest(&mut periodic);
            }
        }
    }

    scheduler.shutdown();
    println!("Stopped");
    Ok(())
}

fn print_latest(outcomes: &mut watch::Receiver<Option<SyncOutcome>>) {
    if let Some(outcome) = outcomes.borrow_and_update().as_ref() {
        println!("{}  {outcome}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    }
}
