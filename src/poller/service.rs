use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{LoadingGuard, SyncStore};
use crate::monitor::{error::FetchError, DataSource};

/// Result of one poll cycle.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Both fetches succeeded and the store was replaced.
    Updated { alerts: usize, readings: usize },
    /// At least one fetch failed; previous data kept.
    Failed(Arc<FetchError>),
    /// The session was stopped before the result could be applied.
    Cancelled,
}

/// Drives a [`DataSource`] and owns writes to a [`SyncStore`].
pub struct Poller<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    source: S,
    store: SyncStore,
    /// Manual refresh trigger. Holds at most one pending permit.
    refresh: Notify,
}

impl<S: DataSource> Poller<S> {
    pub fn new(source: S, store: SyncStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                refresh: Notify::new(),
            }),
        }
    }

    pub fn store(&self) -> &SyncStore {
        &self.inner.store
    }

    /// Spawn the recurring cycle. The first cycle runs immediately.
    ///
    /// Polling continues until the returned handle is stopped or dropped.
    pub fn start(&self, interval: Duration) -> PollerHandle<S> {
        let session = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.inner),
            interval,
            session.clone(),
        ));
        PollerHandle {
            inner: Arc::clone(&self.inner),
            session,
            task: Some(task),
        }
    }
}

/// A running polling session.
///
/// Dropping the handle cancels the session; [`stop`](Self::stop) also waits
/// for the background task to finish.
pub struct PollerHandle<S> {
    inner: Arc<Inner<S>>,
    session: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<S: DataSource> PollerHandle<S> {
    /// Ask the polling task for one cycle outside the schedule.
    ///
    /// Returns immediately. The request is dropped, and `false` returned,
    /// while a cycle is already in flight. Repeated requests before the task
    /// picks one up collapse into a single cycle.
    pub fn refresh_now(&self) -> bool {
        if self.inner.store.is_loading() {
            debug!("Poll cycle already in flight; ignoring refresh");
            return false;
        }
        info!("Manual refresh requested");
        self.inner.refresh.notify_one();
        true
    }

    /// Cancel the session and wait for the polling task to exit.
    ///
    /// Once this returns the store's data is frozen: a fetch still resolving
    /// in the background can no longer be applied.
    pub async fn stop(mut self) {
        self.session.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Poller task ended abnormally");
            }
        }
        info!("Poller stopped");
    }
}

impl<S> Drop for PollerHandle<S> {
    fn drop(&mut self) {
        self.session.cancel();
    }
}

/// Cycles run one at a time on this task, whether scheduled or requested.
async fn run_loop<S: DataSource>(
    inner: Arc<Inner<S>>,
    interval: Duration,
    session: CancellationToken,
) {
    info!(interval_ms = interval.as_millis() as u64, "Poller started");
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = session.cancelled() => break,
            _ = inner.refresh.notified() => {}
            _ = ticker.tick() => {}
        }

        match inner.run_cycle(&session).await {
            CycleOutcome::Updated { alerts, readings } => {
                info!(alerts, readings, "Dashboard data refreshed");
            }
            CycleOutcome::Failed(e) => {
                warn!(
                    error = %e,
                    kind = %e.kind(),
                    url = e.url(),
                    "Poll cycle failed; keeping previous data"
                );
            }
            CycleOutcome::Cancelled => break,
        }
    }

    debug!("Poller loop exited");
}

impl<S: DataSource> Inner<S> {
    async fn run_cycle(&self, session: &CancellationToken) -> CycleOutcome {
        if session.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let _loading = LoadingGuard::acquire(&self.store);

        let fetched = tokio::select! {
            biased;
            _ = session.cancelled() => {
                debug!("Poller stopped mid-cycle; dropping in-flight fetches");
                return CycleOutcome::Cancelled;
            }
            fetched = async {
                tokio::join!(
                    self.source.fetch_recent_alerts(),
                    self.source.fetch_recent_readings(),
                )
            } => fetched,
        };

        match fetched {
            (Ok(alerts), Ok(readings)) => {
                let counts = (alerts.len(), readings.len());
                debug!(
                    newest_alert = alerts.first().map(|a| a.id.as_str()),
                    newest_reading = readings.last().map(|r| r.id.as_str()),
                    "Fetched recent data"
                );
                if !self.store.apply_success(session, alerts, readings, Utc::now()).await {
                    return CycleOutcome::Cancelled;
                }
                CycleOutcome::Updated { alerts: counts.0, readings: counts.1 }
            }
            (Err(e), _) | (_, Err(e)) => {
                let e = Arc::new(e);
                if !self.store.apply_failure(session, Arc::clone(&e)).await {
                    return CycleOutcome::Cancelled;
                }
                CycleOutcome::Failed(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
