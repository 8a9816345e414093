//! Decides when pushes happen.
//!
//! There are two independent timers. The debounce timer collapses a burst of changes into one
//! push of the latest dataset. The periodic timer pushes the latest dataset at a fixed interval.
//! Both run as tokio tasks. A pending push is dropped, not sent, if the scheduler is dropped.

use crate::api::{SyncGateway, SyncOutcome};
use crate::model::Dataset;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// How long to wait after the last change before pushing.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(3000);

/// How often the periodic timer pushes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// What the scheduler is doing, for display.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    /// A push is scheduled but the debounce delay has not passed.
    Pending,
    Syncing,
    Synced {
        at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

impl From<&SyncOutcome> for SyncStatus {
    fn from(outcome: &SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Synced { at, .. } => SyncStatus::Synced { at: *at },
            SyncOutcome::Failed { reason } => SyncStatus::Failed {
                reason: reason.clone(),
            },
        }
    }
}

struct Pending {
    generation: u64,
    dataset: Dataset,
    handle: JoinHandle<()>,
}

struct Inner {
    gateway: SyncGateway,
    debounce: Duration,
    interval: Duration,
    pending: Mutex<Option<Pending>>,
    generation: Mutex<u64>,
    periodic: Mutex<Option<JoinHandle<()>>>,
    latest: Mutex<Option<Dataset>>,
    status: watch::Sender<SyncStatus>,
}

impl Inner {
    async fn push(&self, dataset: &Dataset) -> SyncOutcome {
        self.status.send_replace(SyncStatus::Syncing);
        let outcome = self.gateway.push_now(dataset).await;
        self.status.send_replace(SyncStatus::from(&outcome));
        outcome
    }
}

/// Schedules pushes through a `SyncGateway`.
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("debounce", &self.inner.debounce)
            .field("interval", &self.inner.interval)
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    pub fn new(gateway: SyncGateway, debounce: Duration, interval: Duration) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                gateway,
                debounce,
                interval,
                pending: Mutex::new(None),
                generation: Mutex::new(0),
                periodic: Mutex::new(None),
                latest: Mutex::new(None),
                status,
            }),
        }
    }

    pub fn with_defaults(gateway: SyncGateway) -> Self {
        Self::new(gateway, DEFAULT_DEBOUNCE, DEFAULT_INTERVAL)
    }

    /// Receives every status change. The current value is available right away.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Records `dataset` as the latest one, without scheduling a push. The periodic timer pushes
    /// whatever is latest.
    pub async fn set_latest(&self, dataset: Dataset) {
        *self.inner.latest.lock().await = Some(dataset);
    }

    /// Schedules a push of `dataset` after the debounce delay. A push that is already pending is
    /// cancelled and replaced, so a burst of calls results in one push of the last dataset.
    pub async fn schedule(&self, dataset: Dataset) {
        self.set_latest(dataset.clone()).await;

        let mut pending = self.inner.pending.lock().await;
        if let Some(previous) = pending.take() {
            trace!("Replacing pending push #{}", previous.generation);
            previous.handle.abort();
        }

        let generation = {
            let mut g = self.inner.generation.lock().await;
            *g += 1;
            *g
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            let dataset = {
                let mut pending = inner.pending.lock().await;
                match pending.take() {
                    Some(p) if p.generation == generation => p.dataset,
                    other => {
                        // Replaced while waiting for the lock; the newer task owns the push.
                        *pending = other;
                        return;
                    }
                }
            };
            debug!("Debounce elapsed, pushing");
            inner.push(&dataset).await;
        });

        *pending = Some(Pending {
            generation,
            dataset,
            handle,
        });
        self.inner.status.send_replace(SyncStatus::Pending);
    }

    /// Whether a debounced push is waiting.
    pub async fn has_pending(&self) -> bool {
        self.inner.pending.lock().await.is_some()
    }

    /// Drops the pending push, if any. Calling this when nothing is pending does nothing.
    pub async fn cancel_pending(&self) {
        if let Some(p) = self.inner.pending.lock().await.take() {
            p.handle.abort();
            self.inner.status.send_replace(SyncStatus::Idle);
        }
    }

    /// Pushes the pending dataset now instead of waiting for the debounce delay. Returns `None`
    /// if nothing was pending.
    pub async fn flush(&self) -> Option<SyncOutcome> {
        let pending = self.inner.pending.lock().await.take()?;
        pending.handle.abort();
        Some(self.inner.push(&pending.dataset).await)
    }

    /// Starts pushing the latest dataset every interval. The first push happens one interval from
    /// now. Starting while already started restarts the timer.
    pub async fn start_periodic(&self) {
        let mut periodic = self.inner.periodic.lock().await;
        if let Some(previous) = periodic.take() {
            previous.abort();
        }
        let inner = Arc::clone(&self.inner);
        *periodic = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let latest = inner.latest.lock().await.clone();
                match latest {
                    Some(dataset) => {
                        debug!("Periodic push");
                        inner.push(&dataset).await;
                    }
                    None => trace!("Periodic tick with nothing to push"),
                }
            }
        }));
    }

    /// Stops the periodic timer. Calling this when it is not running does nothing.
    pub async fn stop_periodic(&self) {
        if let Some(handle) = self.inner.periodic.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn is_periodic_running(&self) -> bool {
        self.inner.periodic.lock().await.is_some()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.inner.pending.try_lock() {
            if let Some(p) = pending.take() {
                p.handle.abort();
            }
        }
        if let Ok(mut periodic) = self.inner.periodic.try_lock() {
            if let Some(handle) = periodic.take() {
                handle.abort();
            }
        }
    }
}
