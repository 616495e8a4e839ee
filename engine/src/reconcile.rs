//! Reconciliation of local records with the identities returned by the remote.
//!
//! The remote store answers a batch write with an identifier array that is
//! positionally aligned with the submitted payload: index `i` of the response
//! is the authoritative identity of index `i` of the request. This module turns
//! a batch and its response into an ordered plan of local writes, refusing the
//! whole response when the alignment cannot be trusted.
//!
//! # Checks
//!
//! 1. The response has exactly one identifier per submitted record
//! 2. No identifier is empty
//! 3. A record that was submitted as an update gets its own identifier back
//!
//! A response failing any check yields an error and no steps, so nothing is
//! written locally and the batch stays pending for the next cycle.

use crate::{
    error::Result, EntityClass, Error, LocalId, LocalRecord, RemoteId, Retention, Revision,
    WriteMode,
};
use serde::{Deserialize, Serialize};

/// One local write resulting from a confirmed remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconcileStep {
    /// Attach the remote identity and mark the record synced
    MarkSynced {
        local_id: LocalId,
        remote_id: RemoteId,
        revision: Revision,
    },
    /// Reclaim the record; it is durably mirrored remotely
    Destroy {
        local_id: LocalId,
        revision: Revision,
    },
}

impl ReconcileStep {
    pub fn local_id(&self) -> &LocalId {
        match self {
            ReconcileStep::MarkSynced { local_id, .. } => local_id,
            ReconcileStep::Destroy { local_id, .. } => local_id,
        }
    }
}

/// Ordered local writes for one confirmed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePlan {
    pub class: EntityClass,
    pub steps: Vec<ReconcileStep>,
}

impl ReconcilePlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builds reconcile plans.
pub struct Reconciler;

impl Reconciler {
    /// Plan the local writes for `batch`, which was confirmed with `response`.
    pub fn plan(
        class: EntityClass,
        batch: &[LocalRecord],
        response: &[RemoteId],
    ) -> Result<ReconcilePlan> {
        if batch.len() != response.len() {
            return Err(Error::MisalignedResponse {
                expected: batch.len(),
                got: response.len(),
            });
        }

        let mut steps = Vec::with_capacity(batch.len());
        for (index, (record, remote_id)) in batch.iter().zip(response).enumerate() {
            if record.class != class {
                return Err(Error::ClassMismatch {
                    local_id: record.local_id.clone(),
                    expected: class,
                    actual: record.class,
                });
            }
            if remote_id.trim().is_empty() {
                return Err(Error::EmptyRemoteId(index));
            }
            if class.write_mode() == WriteMode::Upsert {
                if let Some(existing) = &record.remote_id {
                    if existing != remote_id {
                        return Err(Error::RemoteIdConflict {
                            local_id: record.local_id.clone(),
                            existing: existing.clone(),
                            proposed: remote_id.clone(),
                        });
                    }
                }
            }

            let step = match class.retention() {
                Retention::Retain => ReconcileStep::MarkSynced {
                    local_id: record.local_id.clone(),
                    remote_id: remote_id.clone(),
                    revision: record.revision(),
                },
                Retention::Reclaim => ReconcileStep::Destroy {
                    local_id: record.local_id.clone(),
                    revision: record.revision(),
                },
            };
            steps.push(step);
        }

        Ok(ReconcilePlan { class, steps })
    }
}
