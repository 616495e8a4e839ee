//! Mutations applied to local records.
//!
//! Records are never edited field by field from the outside. Every change is
//! expressed as a [`Mutation`] and applied here, in pure code, to a copy of the
//! record; the storage layer then writes the result with a compare-and-set on
//! the state it read. Keeping the transition rules here means the rules for
//! `pending -> synced`, write-once remote ids and dead-lettering hold no matter
//! which process performs the write.

use crate::{
    error::Result, Error, LocalRecord, RemoteId, Revision, Schema, SyncState, Timestamp,
};
use serde::{Deserialize, Serialize};

/// A change to a single local record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Domain amendment: merge `fields` (a JSON object) into the record.
    Amend { fields: serde_json::Value },
    /// The remote store confirmed the record under `remote_id`.
    ///
    /// `revision` is the revision that was submitted.
    MarkSynced {
        remote_id: RemoteId,
        revision: Revision,
    },
    /// The remote store permanently rejected the record.
    RecordRejection {
        reason: String,
        dead_letter_after: u32,
    },
    /// Return a dead-lettered record to the pending queue.
    Requeue,
}

/// What a mutation did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationEffect {
    Amended,
    Synced,
    /// Remote id attached, but the record changed while in flight and stays pending
    RemoteIdAttached,
    /// Already synced under the same identity; nothing changed
    Unchanged,
    Rejected,
    DeadLettered,
    Requeued,
}

impl Mutation {
    /// Apply the mutation to `record`.
    ///
    /// On error the record is left untouched.
    pub fn apply(
        &self,
        record: &mut LocalRecord,
        schema: &Schema,
        timestamp: Timestamp,
    ) -> Result<MutationEffect> {
        let effect = match self {
            Mutation::Amend { fields } => amend(record, fields, schema)?,
            Mutation::MarkSynced {
                remote_id,
                revision,
            } => mark_synced(record, remote_id, *revision)?,
            Mutation::RecordRejection {
                reason,
                dead_letter_after,
            } => record_rejection(record, reason, *dead_letter_after)?,
            Mutation::Requeue => requeue(record)?,
        };

        if effect != MutationEffect::Unchanged {
            record.metadata.updated_at = timestamp;
        }
        Ok(effect)
    }
}

fn amend(
    record: &mut LocalRecord,
    patch: &serde_json::Value,
    schema: &Schema,
) -> Result<MutationEffect> {
    let patch = patch.as_object().ok_or_else(|| Error::InvalidFields {
        class: record.class,
        reason: "amendment must be an object".into(),
    })?;

    let mut merged = record.fields.clone();
    let target = merged.as_object_mut().ok_or_else(|| Error::InvalidFields {
        class: record.class,
        reason: "stored fields are not an object".into(),
    })?;
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
    schema.validate(record.class, &merged)?;

    record.fields = merged;
    record.metadata.revision += 1;
    if record.sync_state == SyncState::DeadLetter {
        record.metadata.rejections = 0;
        record.metadata.last_error = None;
    }
    // A synced record that changes locally goes back out as an update of its remote row.
    record.sync_state = SyncState::Pending;
    Ok(MutationEffect::Amended)
}

fn mark_synced(
    record: &mut LocalRecord,
    remote_id: &RemoteId,
    revision: Revision,
) -> Result<MutationEffect> {
    if let Some(existing) = &record.remote_id {
        if existing != remote_id {
            return Err(Error::RemoteIdConflict {
                local_id: record.local_id.clone(),
                existing: existing.clone(),
                proposed: remote_id.clone(),
            });
        }
    }

    match record.sync_state {
        SyncState::Pending => {}
        SyncState::Synced if record.metadata.revision == revision => {
            return Ok(MutationEffect::Unchanged);
        }
        _ => return Err(Error::NotPending(record.local_id.clone())),
    }

    record.remote_id = Some(remote_id.clone());
    if record.metadata.revision != revision {
        return Ok(MutationEffect::RemoteIdAttached);
    }

    record.sync_state = SyncState::Synced;
    record.metadata.rejections = 0;
    record.metadata.last_error = None;
    Ok(MutationEffect::Synced)
}

fn record_rejection(
    record: &mut LocalRecord,
    reason: &str,
    dead_letter_after: u32,
) -> Result<MutationEffect> {
    if !record.is_pending() {
        return Err(Error::NotPending(record.local_id.clone()));
    }

    record.metadata.rejections += 1;
    record.metadata.last_error = Some(reason.to_string());

    if dead_letter_after > 0 && record.metadata.rejections >= dead_letter_after {
        record.sync_state = SyncState::DeadLetter;
        Ok(MutationEffect::DeadLettered)
    } else {
        Ok(MutationEffect::Rejected)
    }
}

fn requeue(record: &mut LocalRecord) -> Result<MutationEffect> {
    if record.sync_state != SyncState::DeadLetter {
        return Err(Error::NotDeadLettered(record.local_id.clone()));
    }

    record.sync_state = SyncState::Pending;
    record.metadata.rejections = 0;
    record.metadata.last_error = None;
    Ok(MutationEffect::Requeued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityClass;
    use serde_json::json;

    fn alert() -> LocalRecord {
        LocalRecord::new(
            "local-1",
            EntityClass::Alert,
            json!({
                "guard_id": "g-1",
                "alert_type": "panic",
                "is_resolved": false,
                "alert_time": "2026-02-01T08:30:00Z"
            }),
            1000,
        )
    }

    fn synced(remote_id: &str) -> Mutation {
        Mutation::MarkSynced {
            remote_id: remote_id.into(),
            revision: 1,
        }
    }

    #[test]
    fn mark_synced_assigns_remote_id() {
        let schema = Schema::standard();
        let mut record = alert();

        let effect = synced("r1").apply(&mut record, &schema, 2000).unwrap();

        assert_eq!(effect, MutationEffect::Synced);
        assert_eq!(record.sync_state, SyncState::Synced);
        assert_eq!(record.remote_id.as_deref(), Some("r1"));
        assert_eq!(record.metadata.updated_at, 2000);
    }

    #[test]
    fn remote_id_is_write_once() {
        let schema = Schema::standard();
        let mut record = alert();
        synced("r1").apply(&mut record, &schema, 2000).unwrap();
        Mutation::Amend {
            fields: json!({"is_resolved": true}),
        }
        .apply(&mut record, &schema, 3000)
        .unwrap();

        let result = Mutation::MarkSynced {
            remote_id: "r9".into(),
            revision: 2,
        }
        .apply(&mut record, &schema, 4000);

        assert!(matches!(result, Err(Error::RemoteIdConflict { existing, .. }) if existing == "r1"));
        assert_eq!(record.remote_id.as_deref(), Some("r1"));
        assert!(record.is_pending());
    }

    #[test]
    fn amending_a_synced_record_requeues_it_as_an_update() {
        let schema = Schema::standard();
        let mut record = alert();
        synced("r1").apply(&mut record, &schema, 2000).unwrap();

        let effect = Mutation::Amend {
            fields: json!({"is_resolved": true}),
        }
        .apply(&mut record, &schema, 3000)
        .unwrap();

        assert_eq!(effect, MutationEffect::Amended);
        assert_eq!(record.sync_state, SyncState::Pending);
        assert_eq!(record.remote_id.as_deref(), Some("r1"));
        assert_eq!(record.revision(), 2);
        assert_eq!(record.fields["is_resolved"], true);
    }

    #[test]
    fn stale_confirmation_attaches_id_but_stays_pending() {
        let schema = Schema::standard();
        let mut record = alert();
        Mutation::Amend {
            fields: json!({"description": "gate 2"}),
        }
        .apply(&mut record, &schema, 1500)
        .unwrap();

        // Revision 1 was submitted, revision 2 is stored.
        let effect = synced("r1").apply(&mut record, &schema, 2000).unwrap();

        assert_eq!(effect, MutationEffect::RemoteIdAttached);
        assert!(record.is_pending());
        assert_eq!(record.remote_id.as_deref(), Some("r1"));
    }

    #[test]
    fn repeated_confirmation_is_unchanged() {
        let schema = Schema::standard();
        let mut record = alert();
        synced("r1").apply(&mut record, &schema, 2000).unwrap();

        let effect = synced("r1").apply(&mut record, &schema, 5000).unwrap();

        assert_eq!(effect, MutationEffect::Unchanged);
        assert_eq!(record.metadata.updated_at, 2000);
    }

    #[test]
    fn invalid_amendment_leaves_record_untouched() {
        let schema = Schema::standard();
        let mut record = alert();
        let before = record.clone();

        let result = Mutation::Amend {
            fields: json!({"is_resolved": "yes"}),
        }
        .apply(&mut record, &schema, 2000);

        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
        assert_eq!(record, before);

        let result = Mutation::Amend {
            fields: json!("resolved"),
        }
        .apply(&mut record, &schema, 2000);
        assert!(matches!(result, Err(Error::InvalidFields { .. })));
        assert_eq!(record, before);
    }

    #[test]
    fn rejections_dead_letter_at_threshold() {
        let schema = Schema::standard();
        let mut record = alert();
        let reject = Mutation::RecordRejection {
            reason: "violates check constraint".into(),
            dead_letter_after: 2,
        };

        assert_eq!(
            reject.apply(&mut record, &schema, 2000).unwrap(),
            MutationEffect::Rejected
        );
        assert!(record.is_pending());

        assert_eq!(
            reject.apply(&mut record, &schema, 3000).unwrap(),
            MutationEffect::DeadLettered
        );
        assert_eq!(record.sync_state, SyncState::DeadLetter);
        assert_eq!(record.metadata.rejections, 2);
        assert_eq!(
            record.metadata.last_error.as_deref(),
            Some("violates check constraint")
        );

        assert!(matches!(
            reject.apply(&mut record, &schema, 4000),
            Err(Error::NotPending(_))
        ));
    }

    #[test]
    fn zero_threshold_never_dead_letters() {
        let schema = Schema::standard();
        let mut record = alert();
        let reject = Mutation::RecordRejection {
            reason: "bad".into(),
            dead_letter_after: 0,
        };
        for _ in 0..10 {
            reject.apply(&mut record, &schema, 2000).unwrap();
        }
        assert!(record.is_pending());
    }

    #[test]
    fn requeue_only_from_dead_letter() {
        let schema = Schema::standard();
        let mut record = alert();
        assert!(matches!(
            Mutation::Requeue.apply(&mut record, &schema, 2000),
            Err(Error::NotDeadLettered(_))
        ));

        Mutation::RecordRejection {
            reason: "bad".into(),
            dead_letter_after: 1,
        }
        .apply(&mut record, &schema, 2000)
        .unwrap();

        let effect = Mutation::Requeue.apply(&mut record, &schema, 3000).unwrap();
        assert_eq!(effect, MutationEffect::Requeued);
        assert!(record.is_pending());
        assert_eq!(record.metadata.rejections, 0);
        assert!(record.metadata.last_error.is_none());
    }

    #[test]
    fn amending_dead_letter_resets_rejections() {
        let schema = Schema::standard();
        let mut record = alert();
        Mutation::RecordRejection {
            reason: "bad".into(),
            dead_letter_after: 1,
        }
        .apply(&mut record, &schema, 2000)
        .unwrap();

        Mutation::Amend {
            fields: json!({"alert_type": "fire"}),
        }
        .apply(&mut record, &schema, 3000)
        .unwrap();

        assert!(record.is_pending());
        assert_eq!(record.metadata.rejections, 0);
    }

    #[test]
    fn mutation_serialization() {
        let json = serde_json::to_value(synced("r1")).unwrap();
        assert_eq!(json["type"], "mark_synced");
        assert_eq!(json["remote_id"], "r1");
    }
}
