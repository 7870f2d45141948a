//! Background scheduling of sync runs.
//!
//! Two classes of run exist. `Manual` runs are one-shot and a new request
//! replaces (cancels) the active one. `Auto` runs come from a single periodic
//! loop whose interval can be changed in place. Every run waits for network
//! connectivity, is cancelled when connectivity drops, and retries transient
//! failures with capped exponential backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::mutation::SyncTrigger;
use super::orchestrator::{SyncMode, SyncOrchestrator, SyncOutcome, CANCELLED_MESSAGE};
use crate::config::RetryConfig;

/// Independent scheduling lanes; at most one run per class is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncClass {
    Auto,
    Manual,
}

/// Shared view of network connectivity.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self {
            state: Arc::new(state),
        }
    }

    /// Monitor for environments without connectivity signals.
    pub fn always_connected() -> Self {
        Self::new(true)
    }

    pub fn set_connected(&self, connected: bool) {
        let changed = self.state.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        if changed {
            tracing::info!(
                "Network {}",
                if connected { "available" } else { "lost" }
            );
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

/// Capped exponential backoff for transient sync failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Never retry.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if scaled.is_finite() && scaled < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(scaled)
        } else {
            self.max_delay
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs(config.base_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            backoff_factor: config.backoff_factor,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

#[derive(Default)]
struct ManualLane {
    generation: u64,
    cancel: Option<CancellationToken>,
    running: bool,
    /// A mutation asked for a sync while this lane was busy
    follow_up: bool,
}

struct PeriodicLane {
    interval: watch::Sender<Duration>,
    cancel: CancellationToken,
}

struct Inner {
    orchestrator: Arc<SyncOrchestrator>,
    network: NetworkMonitor,
    retry: RetryPolicy,
    manual: Mutex<ManualLane>,
    periodic: Mutex<Option<PeriodicLane>>,
    auto_running: AtomicBool,
    manual_outcome: watch::Sender<Option<SyncOutcome>>,
    auto_outcome: watch::Sender<Option<SyncOutcome>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a [`SyncOrchestrator`] on demand and on a schedule.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        network: NetworkMonitor,
        retry: RetryPolicy,
    ) -> Self {
        let (manual_outcome, _) = watch::channel(None);
        let (auto_outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                network,
                retry,
                manual: Mutex::new(ManualLane::default()),
                periodic: Mutex::new(None),
                auto_running: AtomicBool::new(false),
                manual_outcome,
                auto_outcome,
            }),
        }
    }

    /// Start a manual run now, cancelling any manual run still active.
    pub fn run_now(&self, mode: SyncMode) -> JoinHandle<SyncOutcome> {
        Inner::start_manual(&self.inner, mode)
    }

    /// Run incremental syncs every `interval`; an existing schedule is
    /// updated in place.
    pub fn schedule_periodic(&self, interval: Duration) {
        let mut lane = lock(&self.inner.periodic);
        if let Some(existing) = lane.as_ref().filter(|active| !active.cancel.is_cancelled()) {
            existing.interval.send_replace(interval);
            tracing::info!("Periodic sync interval updated to {:?}", interval);
            return;
        }

        let (interval_tx, interval_rx) = watch::channel(interval);
        let cancel = CancellationToken::new();
        tokio::spawn(Inner::periodic_loop(
            Arc::clone(&self.inner),
            interval_rx,
            cancel.clone(),
        ));
        *lane = Some(PeriodicLane {
            interval: interval_tx,
            cancel,
        });
        tracing::info!("Periodic sync scheduled every {:?}", interval);
    }

    /// Stop the periodic schedule, cancelling its active run.
    pub fn cancel_periodic(&self) {
        if let Some(lane) = lock(&self.inner.periodic).take() {
            lane.cancel.cancel();
            tracing::info!("Periodic sync cancelled");
        }
    }

    pub fn is_running(&self, class: SyncClass) -> bool {
        match class {
            SyncClass::Manual => lock(&self.inner.manual).running,
            SyncClass::Auto => self.inner.auto_running.load(Ordering::SeqCst),
        }
    }

    /// Latest finished outcome of a class, `None` before the first run.
    pub fn subscribe_outcome(&self, class: SyncClass) -> watch::Receiver<Option<SyncOutcome>> {
        self.inner.outcome_sender(class).subscribe()
    }

    /// Handle for mutations to request follow-up syncs.
    ///
    /// The handle does not keep the scheduler alive.
    pub fn trigger(&self) -> Arc<dyn SyncTrigger> {
        Arc::new(SchedulerTrigger {
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Cancel everything that is queued or running.
    pub fn shutdown(&self) {
        self.cancel_periodic();
        let mut manual = lock(&self.inner.manual);
        if let Some(cancel) = manual.cancel.take() {
            cancel.cancel();
        }
        manual.follow_up = false;
    }
}

impl Inner {
    fn outcome_sender(&self, class: SyncClass) -> &watch::Sender<Option<SyncOutcome>> {
        match class {
            SyncClass::Manual => &self.manual_outcome,
            SyncClass::Auto => &self.auto_outcome,
        }
    }

    fn start_manual(inner: &Arc<Self>, mode: SyncMode) -> JoinHandle<SyncOutcome> {
        let cancel = CancellationToken::new();
        let generation = {
            let mut lane = lock(&inner.manual);
            if let Some(previous) = lane.cancel.replace(cancel.clone()) {
                tracing::debug!("Replacing active manual sync");
                previous.cancel();
            }
            lane.generation += 1;
            lane.running = true;
            lane.generation
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let outcome = inner
                .run_with_retry(SyncClass::Manual, mode, &cancel)
                .await;

            let follow_up = {
                let mut lane = lock(&inner.manual);
                if lane.generation == generation {
                    lane.running = false;
                    lane.cancel = None;
                    std::mem::take(&mut lane.follow_up)
                } else {
                    false
                }
            };
            if follow_up {
                tracing::debug!("Starting follow-up sync requested during manual run");
                Self::start_manual(&inner, SyncMode::Incremental);
            }
            outcome
        })
    }

    fn request_follow_up(inner: &Arc<Self>) {
        {
            let mut lane = lock(&inner.manual);
            if lane.running {
                lane.follow_up = true;
                return;
            }
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            Self::start_manual(inner, SyncMode::Incremental);
        } else {
            tracing::warn!("Follow-up sync requested outside the async runtime; skipped");
        }
    }

    async fn periodic_loop(
        self: Arc<Self>,
        mut interval: watch::Receiver<Duration>,
        cancel: CancellationToken,
    ) {
        loop {
            let period = *interval.borrow_and_update();
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = interval.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                () = tokio::time::sleep(period) => {}
            }

            self.auto_running.store(true, Ordering::SeqCst);
            self.run_with_retry(SyncClass::Auto, SyncMode::Incremental, &cancel)
                .await;
            self.auto_running.store(false, Ordering::SeqCst);
        }
    }

    async fn run_with_retry(
        &self,
        class: SyncClass,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> SyncOutcome {
        let mut attempt = 0;
        let outcome = loop {
            if !self.wait_for_network(cancel).await {
                break SyncOutcome::NetworkError(CANCELLED_MESSAGE.to_string());
            }

            let outcome = self.run_connected(mode, cancel).await;
            if !outcome.is_transient() || cancel.is_cancelled() || attempt >= self.retry.max_retries
            {
                break outcome;
            }

            let delay = self.retry.delay_for(attempt);
            attempt += 1;
            tracing::warn!(
                "{:?} sync failed ({}), retry {}/{} in {:?}",
                class,
                outcome,
                attempt,
                self.retry.max_retries,
                delay
            );
            tokio::select! {
                () = cancel.cancelled() => break outcome,
                () = tokio::time::sleep(delay) => {}
            }
        };

        self.outcome_sender(class).send_replace(Some(outcome.clone()));
        outcome
    }

    /// Wait until connected; `false` when cancelled first.
    async fn wait_for_network(&self, cancel: &CancellationToken) -> bool {
        let mut network = self.network.subscribe();
        if *network.borrow_and_update() {
            return true;
        }
        tracing::debug!("Sync waiting for network");
        tokio::select! {
            () = cancel.cancelled() => false,
            connected = network.wait_for(|connected| *connected) => connected.is_ok(),
        }
    }

    /// One orchestrator run that is cancelled if connectivity drops.
    async fn run_connected(&self, mode: SyncMode, cancel: &CancellationToken) -> SyncOutcome {
        let run_token = cancel.child_token();
        let mut network = self.network.subscribe();
        let watchdog = {
            let run_token = run_token.clone();
            tokio::spawn(async move {
                if network.wait_for(|connected| !*connected).await.is_ok() {
                    run_token.cancel();
                }
            })
        };

        let outcome = self.orchestrator.run(mode, &run_token).await;
        watchdog.abort();
        outcome
    }
}

struct SchedulerTrigger {
    inner: Weak<Inner>,
}

impl SyncTrigger for SchedulerTrigger {
    fn request_sync(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Inner::request_follow_up(&inner);
        }
    }
}
