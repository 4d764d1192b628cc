use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::monitor::{
    error::FetchError,
    models::{Alert, Reading},
};

/// Read-only copy of the synchronized dashboard data.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    /// Newest first, as delivered.
    pub alerts: Arc<Vec<Alert>>,
    /// Oldest first, as delivered.
    pub readings: Arc<Vec<Reading>>,
    /// A poll cycle is in flight.
    pub loading: bool,
    /// Completion time of the last successful cycle.
    pub last_updated: Option<DateTime<Utc>>,
    /// Error of the last cycle, cleared by the next success.
    pub last_error: Option<Arc<FetchError>>,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct SyncData {
    alerts: Arc<Vec<Alert>>,
    readings: Arc<Vec<Reading>>,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<Arc<FetchError>>,
    consecutive_failures: u32,
}

/// Shared handle to the poller's state.
///
/// Anyone holding a clone may take snapshots; only the poller writes.
/// `alerts` and `readings` are only ever replaced together, under one
/// write lock.
#[derive(Debug, Clone, Default)]
pub struct SyncStore {
    data: Arc<RwLock<SyncData>>,
    loading: Arc<AtomicBool>,
}

impl SyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let data = self.data.read().await;
        SyncSnapshot {
            alerts: Arc::clone(&data.alerts),
            readings: Arc::clone(&data.readings),
            loading: self.is_loading(),
            last_updated: data.last_updated,
            last_error: data.last_error.clone(),
            consecutive_failures: data.consecutive_failures,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Replace both sequences, stamp `now`, clear the error.
    ///
    /// Returns `false` without touching anything if `session` is cancelled.
    pub(super) async fn apply_success(
        &self,
        session: &CancellationToken,
        alerts: Vec<Alert>,
        readings: Vec<Reading>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut data = self.data.write().await;
        if session.is_cancelled() {
            return false;
        }
        data.alerts = Arc::new(alerts);
        data.readings = Arc::new(readings);
        data.last_updated = Some(now);
        data.last_error = None;
        data.consecutive_failures = 0;
        true
    }

    /// Record `error`, keeping the previous alerts and readings.
    ///
    /// Returns `false` without touching anything if `session` is cancelled.
    pub(super) async fn apply_failure(
        &self,
        session: &CancellationToken,
        error: Arc<FetchError>,
    ) -> bool {
        let mut data = self.data.write().await;
        if session.is_cancelled() {
            return false;
        }
        data.last_error = Some(error);
        data.consecutive_failures = data.consecutive_failures.saturating_add(1);
        true
    }
}

/// Holds `loading = true` for its lifetime.
///
/// Cleared on drop, which covers success, failure and a cycle future being
/// dropped mid-fetch.
pub(super) struct LoadingGuard<'a> {
    store: &'a SyncStore,
}

impl<'a> LoadingGuard<'a> {
    pub(super) fn acquire(store: &'a SyncStore) -> Self {
        store.loading.store(true, Ordering::Release);
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.loading.store(false, Ordering::Release);
    }
}
