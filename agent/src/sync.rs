//! Sync orchestration.
//!
//! A sync cycle drains the pending records of every class, in
//! [`EntityClass::SYNC_ORDER`], through the remote gateway and reconciles the
//! returned identities back into the local store. Only one cycle runs at a
//! time; a cycle started while another is in flight is skipped, not queued.
//!
//! Failures are contained per class. A transient failure (network, timeout,
//! server error, unusable response) leaves the class untouched for the next
//! cycle. A permanent rejection of a batch makes the cycle resubmit its
//! records one by one, so a single bad record cannot hold back the rest of
//! its class; records rejected on their own count toward dead-lettering.

use crate::error::{AgentError, StoreError};
use crate::gateway::{GatewayError, RemoteGateway};
use crate::store::LocalStore;
use fieldsync_engine::{
    build_payload, record_payload, EntityClass, LocalRecord, Mutation, MutationEffect,
    ReconcileStep, Reconciler, RemoteId, SyncState,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sync tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Permanent rejections before a record is dead-lettered; 0 disables
    pub dead_letter_after: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dead_letter_after: 5,
        }
    }
}

/// Result of one class within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassOutcome {
    /// Nothing was pending
    Empty,
    /// The whole batch was confirmed
    Synced { count: usize },
    /// The batch was rejected and its records were submitted one by one
    Partial {
        synced: usize,
        rejected: usize,
        /// Records not attempted after a transient failure
        deferred: usize,
    },
    /// Nothing was written locally; the class is retried next cycle
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class: EntityClass,
    #[serde(flatten)]
    pub outcome: ClassOutcome,
}

/// Result of [`SyncOrchestrator::sync_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "classes", rename_all = "snake_case")]
pub enum SyncReport {
    /// Another cycle was already running
    Skipped,
    Completed(Vec<ClassReport>),
}

impl SyncReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncReport::Skipped)
    }

    pub fn outcome(&self, class: EntityClass) -> Option<&ClassOutcome> {
        match self {
            SyncReport::Skipped => None,
            SyncReport::Completed(reports) => reports
                .iter()
                .find(|report| report.class == class)
                .map(|report| &report.outcome),
        }
    }
}

/// Single-flight gate. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight(Arc<AtomicBool>);

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate, or `None` when it is already held.
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(self.0.clone()))
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped, including on panic or cancellation.
#[derive(Debug)]
pub struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains pending local records to the remote store.
pub struct SyncOrchestrator {
    store: LocalStore,
    gateway: Arc<dyn RemoteGateway>,
    options: SyncOptions,
    flight: SingleFlight,
}

impl SyncOrchestrator {
    pub fn new(store: LocalStore, gateway: Arc<dyn RemoteGateway>, options: SyncOptions) -> Self {
        Self {
            store,
            gateway,
            options,
            flight: SingleFlight::new(),
        }
    }

    /// Share a single-flight gate with other orchestrators in the process.
    pub fn with_single_flight(mut self, flight: SingleFlight) -> Self {
        self.flight = flight;
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn is_syncing(&self) -> bool {
        self.flight.is_held()
    }

    /// Run one sync cycle over all classes.
    pub async fn sync_all(&self) -> SyncReport {
        let Some(_guard) = self.flight.try_acquire() else {
            tracing::debug!("sync already in flight, skipping");
            return SyncReport::Skipped;
        };

        tracing::info!("sync cycle started");
        let mut reports = Vec::with_capacity(EntityClass::SYNC_ORDER.len());
        for class in EntityClass::SYNC_ORDER {
            let outcome = self.sync_class(class).await;
            match &outcome {
                ClassOutcome::Empty => {}
                ClassOutcome::Synced { count } => {
                    tracing::info!(class = %class, count, "class synced");
                }
                ClassOutcome::Partial {
                    synced,
                    rejected,
                    deferred,
                } => {
                    tracing::warn!(class = %class, synced, rejected, deferred, "class partially synced");
                }
                ClassOutcome::Failed { error } => {
                    tracing::error!(class = %class, %error, "class sync failed");
                }
            }
            reports.push(ClassReport { class, outcome });
        }
        tracing::info!("sync cycle finished");

        SyncReport::Completed(reports)
    }

    /// Pending record count per class, in sync order.
    pub async fn pending_summary(&self) -> Result<Vec<(EntityClass, u64)>, StoreError> {
        let mut summary = Vec::with_capacity(EntityClass::SYNC_ORDER.len());
        for class in EntityClass::SYNC_ORDER {
            summary.push((class, self.store.count(class, SyncState::Pending).await?));
        }
        Ok(summary)
    }

    async fn sync_class(&self, class: EntityClass) -> ClassOutcome {
        let pending = match self.store.query_pending(class).await {
            Ok(pending) => pending,
            Err(e) => return failed(e),
        };
        if pending.is_empty() {
            return ClassOutcome::Empty;
        }

        let payload = match build_payload(class, &pending) {
            Ok(payload) => payload,
            Err(e) => return failed(e),
        };

        tracing::debug!(class = %class, count = pending.len(), "submitting batch");
        match self.gateway.upsert(class, payload).await {
            Ok(ids) => match self.reconcile(class, &pending, &ids).await {
                Ok(count) => ClassOutcome::Synced { count },
                Err(e) => failed(e),
            },
            Err(e) if e.is_permanent() => self.isolate(class, pending, e).await,
            Err(e) => failed(e),
        }
    }

    /// Apply a confirmed response to the batch it answers.
    ///
    /// Returns how many records reached their final state.
    async fn reconcile(
        &self,
        class: EntityClass,
        batch: &[LocalRecord],
        response: &[RemoteId],
    ) -> Result<usize, AgentError> {
        let plan = Reconciler::plan(class, batch, response)?;

        let mut settled = 0;
        for step in plan.steps {
            match step {
                ReconcileStep::MarkSynced {
                    local_id,
                    remote_id,
                    revision,
                } => {
                    let mutation = Mutation::MarkSynced {
                        remote_id,
                        revision,
                    };
                    match self.store.update(&local_id, &mutation).await {
                        Ok((_, MutationEffect::Synced)) | Ok((_, MutationEffect::Unchanged)) => {
                            settled += 1
                        }
                        Ok((_, effect)) => {
                            tracing::debug!(%local_id, ?effect, "record amended while in flight");
                        }
                        Err(e) => {
                            tracing::error!(%local_id, error = %e, "failed to mark record synced");
                        }
                    }
                }
                ReconcileStep::Destroy { local_id, revision } => {
                    match self.store.destroy_if_unchanged(&local_id, revision).await {
                        Ok(true) => settled += 1,
                        Ok(false) => {
                            tracing::debug!(%local_id, "record already reclaimed or amended");
                        }
                        Err(e) => {
                            tracing::error!(%local_id, error = %e, "failed to reclaim record");
                        }
                    }
                }
            }
        }

        Ok(settled)
    }

    /// Resubmit a rejected batch record by record.
    async fn isolate(
        &self,
        class: EntityClass,
        batch: Vec<LocalRecord>,
        batch_error: GatewayError,
    ) -> ClassOutcome {
        if let [record] = batch.as_slice() {
            self.reject(record, &batch_error).await;
            return ClassOutcome::Partial {
                synced: 0,
                rejected: 1,
                deferred: 0,
            };
        }

        tracing::warn!(class = %class, error = %batch_error, count = batch.len(), "batch rejected, isolating records");
        let total = batch.len();
        let mut synced = 0;
        let mut rejected = 0;

        for (index, record) in batch.iter().enumerate() {
            let payload = match record_payload(record) {
                Ok(payload) => payload,
                Err(e) => return failed(e),
            };

            match self.gateway.upsert(class, vec![payload]).await {
                Ok(ids) => {
                    match self
                        .reconcile(class, std::slice::from_ref(record), &ids)
                        .await
                    {
                        Ok(settled) => synced += settled,
                        Err(e) => {
                            tracing::warn!(local_id = %record.local_id, error = %e, "unusable response for single record");
                        }
                    }
                }
                Err(e) if e.is_permanent() => {
                    self.reject(record, &e).await;
                    rejected += 1;
                }
                Err(e) => {
                    tracing::warn!(class = %class, error = %e, "transient failure while isolating, deferring rest");
                    return ClassOutcome::Partial {
                        synced,
                        rejected,
                        deferred: total - index,
                    };
                }
            }
        }

        ClassOutcome::Partial {
            synced,
            rejected,
            deferred: 0,
        }
    }

    async fn reject(&self, record: &LocalRecord, error: &GatewayError) {
        let mutation = Mutation::RecordRejection {
            reason: error.to_string(),
            dead_letter_after: self.options.dead_letter_after,
        };
        match self.store.update(&record.local_id, &mutation).await {
            Ok((_, MutationEffect::DeadLettered)) => {
                tracing::error!(local_id = %record.local_id, class = %record.class, %error, "record dead-lettered");
            }
            Ok(_) => {
                tracing::warn!(local_id = %record.local_id, class = %record.class, %error, "record rejected");
            }
            Err(e) => {
                tracing::error!(local_id = %record.local_id, error = %e, "failed to record rejection");
            }
        }
    }
}

fn failed(error: impl Into<AgentError>) -> ClassOutcome {
    ClassOutcome::Failed {
        error: error.into().to_string(),
    }
}

/// Run a sync cycle every `every` until the task is aborted.
pub fn spawn_periodic_sync(orchestrator: Arc<SyncOrchestrator>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = orchestrator.sync_all().await;
            tracing::trace!(skipped = report.is_skipped(), "periodic sync tick");
        }
    })
}
