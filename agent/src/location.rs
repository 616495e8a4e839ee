//! Background location capture.
//!
//! The host OS delivers batches of location fixes to a registered background
//! task, possibly in a fresh process with no UI. Each fix is committed to the
//! local store as a pending location ping before any network attempt, then
//! uploaded opportunistically; whatever does not get through is drained by the
//! next sync cycle.

use crate::error::Result;
use crate::gateway::RemoteGateway;
use crate::session::SessionProvider;
use crate::store::LocalStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fieldsync_engine::{record_payload, LocalRecord, LocationPingEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name the tracking task is registered under with the host scheduler.
pub const GPS_TASK_NAME: &str = "FIELDSYNC_GPS_TRACKING";

/// One fix as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Reported by the OS when the fix came from a mock provider
    #[serde(default)]
    pub mocked: bool,
    #[serde(default)]
    pub battery_level: Option<f64>,
}

/// Update thresholds for the tracking task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingOptions {
    pub interval_secs: u64,
    pub distance_meters: f64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            distance_meters: 50.0,
        }
    }
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("background location permission denied")]
    PermissionDenied,

    #[error("host scheduler failed: {0}")]
    Host(String),
}

/// The host's background task scheduler.
pub trait TaskScheduler: Send + Sync {
    fn is_registered(&self, name: &str) -> std::result::Result<bool, SchedulerError>;

    fn register(
        &self,
        name: &str,
        options: &TrackingOptions,
    ) -> std::result::Result<(), SchedulerError>;

    fn unregister(&self, name: &str) -> std::result::Result<(), SchedulerError>;
}

/// Scheduler keeping registrations in memory, for the standalone binary and tests.
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    tasks: DashMap<String, TrackingOptions>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self, name: &str) -> Option<TrackingOptions> {
        self.tasks.get(name).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskScheduler for InMemoryScheduler {
    fn is_registered(&self, name: &str) -> std::result::Result<bool, SchedulerError> {
        Ok(self.tasks.contains_key(name))
    }

    fn register(
        &self,
        name: &str,
        options: &TrackingOptions,
    ) -> std::result::Result<(), SchedulerError> {
        self.tasks.insert(name.to_string(), *options);
        Ok(())
    }

    fn unregister(&self, name: &str) -> std::result::Result<(), SchedulerError> {
        self.tasks.remove(name);
        Ok(())
    }
}

/// Register the tracking task unless it already is.
///
/// Returns whether a registration was made.
pub fn start_tracking(
    scheduler: &dyn TaskScheduler,
    options: &TrackingOptions,
) -> std::result::Result<bool, SchedulerError> {
    if scheduler.is_registered(GPS_TASK_NAME)? {
        tracing::debug!(task = GPS_TASK_NAME, "tracking already registered");
        return Ok(false);
    }
    scheduler.register(GPS_TASK_NAME, options)?;
    tracing::info!(
        task = GPS_TASK_NAME,
        interval_secs = options.interval_secs,
        distance_meters = options.distance_meters,
        "tracking registered"
    );
    Ok(true)
}

/// Unregister the tracking task if registered. Returns whether it was.
pub fn stop_tracking(scheduler: &dyn TaskScheduler) -> std::result::Result<bool, SchedulerError> {
    if !scheduler.is_registered(GPS_TASK_NAME)? {
        return Ok(false);
    }
    scheduler.unregister(GPS_TASK_NAME)?;
    tracing::info!(task = GPS_TASK_NAME, "tracking stopped");
    Ok(true)
}

/// What one task invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    NoFixes,
    /// Nobody is signed in; nothing was recorded
    NoSession,
    Captured {
        /// Pings committed locally
        stored: usize,
        /// Pings confirmed remotely and reclaimed
        uploaded: usize,
    },
}

/// Handler for the background location task.
pub struct LocationCapture {
    store: LocalStore,
    gateway: Arc<dyn RemoteGateway>,
    session: Arc<dyn SessionProvider>,
}

impl LocationCapture {
    pub fn new(
        store: LocalStore,
        gateway: Arc<dyn RemoteGateway>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            store,
            gateway,
            session,
        }
    }

    /// Handle one batch of fixes delivered by the host.
    ///
    /// Every fix is persisted before its upload is attempted. After the first
    /// failed upload the remaining fixes are only persisted.
    pub async fn handle(&self, fixes: &[LocationFix]) -> Result<CaptureOutcome> {
        if fixes.is_empty() {
            return Ok(CaptureOutcome::NoFixes);
        }

        let Some(identity) = self.session.current_identity()? else {
            tracing::debug!(fixes = fixes.len(), "no session, dropping location fixes");
            return Ok(CaptureOutcome::NoSession);
        };

        let mut stored = 0;
        let mut uploaded = 0;
        let mut reachable = true;

        for fix in fixes {
            let entry = LocationPingEntry {
                employee_id: identity.employee_id.clone(),
                latitude: fix.latitude,
                longitude: fix.longitude,
                tracked_at: fix.timestamp,
                is_mock_location: fix.mocked,
                battery_level: fix.battery_level,
            };
            let record = self.store.create_entry(&entry).await?;
            stored += 1;

            if reachable {
                if self.upload(&record).await {
                    uploaded += 1;
                } else {
                    reachable = false;
                }
            }
        }

        tracing::debug!(stored, uploaded, "location fixes captured");
        Ok(CaptureOutcome::Captured { stored, uploaded })
    }

    async fn upload(&self, record: &LocalRecord) -> bool {
        let payload = match record_payload(record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(local_id = %record.local_id, error = %e, "ping payload failed");
                return false;
            }
        };

        match self.gateway.insert(record.class, payload).await {
            Ok(remote_id) => {
                match self
                    .store
                    .destroy_if_unchanged(&record.local_id, record.revision())
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(local_id = %record.local_id, "ping already reclaimed");
                    }
                    Err(e) => {
                        tracing::warn!(local_id = %record.local_id, %remote_id, error = %e, "uploaded ping not reclaimed");
                    }
                }
                true
            }
            Err(e) => {
                tracing::debug!(local_id = %record.local_id, error = %e, "ping upload failed, left pending");
                false
            }
        }
    }
}
