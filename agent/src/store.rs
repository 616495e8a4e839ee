//! Durable local store.
//!
//! Every captured record is committed here before anything else happens to
//! it. The store is safe to share between the foreground app and a background
//! task running in another process: all record changes go through
//! [`LocalStore::update`], which applies a [`Mutation`] to a fresh read and
//! writes it back with a compare-and-set on the state it read.

use crate::db::{self, Pool};
use crate::error::StoreError;
use fieldsync_engine::{
    EntityClass, Entry, LocalRecord, Mutation, MutationEffect, Revision, Schema, SyncState,
    Timestamp,
};
use serde_json::Value;
use std::sync::Arc;

/// How many times a mutation is re-applied when the row changes underneath it.
const CAS_ATTEMPTS: usize = 3;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to the local record store. Cheap to clone.
#[derive(Clone)]
pub struct LocalStore {
    pool: Pool,
    schema: Arc<Schema>,
}

impl LocalStore {
    /// Open (creating if needed) the store at `database_url` and migrate it.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = db::create_pool(database_url).await?;
        db::run_migrations(&pool).await?;
        tracing::debug!(database_url, "local store opened");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an already migrated pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            schema: Arc::new(Schema::standard()),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Close the underlying pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create a pending record. Invalid fields are refused and nothing is written.
    pub async fn create(&self, class: EntityClass, fields: Value) -> Result<LocalRecord> {
        self.schema.validate(class, &fields)?;

        let local_id = uuid::Uuid::new_v4().to_string();
        let record = LocalRecord::new(local_id, class, fields, now_millis());
        db::insert_record(&self.pool, &record).await?;

        tracing::debug!(local_id = %record.local_id, class = %class, "record created");
        Ok(record)
    }

    /// Create a pending record from a typed entry.
    pub async fn create_entry<E: Entry>(&self, entry: &E) -> Result<LocalRecord> {
        self.create(E::CLASS, entry.to_fields()?).await
    }

    /// Pending records of `class` in creation order.
    pub async fn query_pending(&self, class: EntityClass) -> Result<Vec<LocalRecord>> {
        self.query(class, SyncState::Pending).await
    }

    /// Records of `class` in `state`, in creation order.
    pub async fn query(&self, class: EntityClass, state: SyncState) -> Result<Vec<LocalRecord>> {
        db::get_records_in_state(&self.pool, class, state)
            .await?
            .iter()
            .map(db::StoredRecord::to_record)
            .collect()
    }

    pub async fn get(&self, local_id: &str) -> Result<Option<LocalRecord>> {
        db::get_record(&self.pool, local_id)
            .await?
            .map(|row| row.to_record())
            .transpose()
    }

    /// Apply `mutation` to the current state of the record and persist it.
    ///
    /// When another writer changes the row between the read and the write, the
    /// mutation is re-applied to the new state. [`StoreError::Conflict`] is
    /// returned only if the row keeps changing.
    pub async fn update(
        &self,
        local_id: &str,
        mutation: &Mutation,
    ) -> Result<(LocalRecord, MutationEffect)> {
        for attempt in 1..=CAS_ATTEMPTS {
            let before = self
                .get(local_id)
                .await?
                .ok_or_else(|| StoreError::NotFound(local_id.to_string()))?;

            if let Some(written) = self.apply_to(&before, mutation).await? {
                return Ok(written);
            }
            tracing::debug!(local_id, attempt, "record changed concurrently, retrying");
        }

        Err(StoreError::Conflict(local_id.to_string()))
    }

    /// Apply `mutation` to `before` and write the result if the row still
    /// matches `before`. `None` means another writer got there first.
    async fn apply_to(
        &self,
        before: &LocalRecord,
        mutation: &Mutation,
    ) -> Result<Option<(LocalRecord, MutationEffect)>> {
        let mut after = before.clone();
        let effect = mutation.apply(&mut after, &self.schema, now_millis())?;
        if effect == MutationEffect::Unchanged {
            return Ok(Some((after, effect)));
        }

        if !db::compare_and_set(&self.pool, before, &after).await? {
            return Ok(None);
        }
        tracing::trace!(local_id = %after.local_id, ?effect, revision = after.revision(), "record updated");
        Ok(Some((after, effect)))
    }

    /// Amend a record through its typed entry.
    pub async fn amend_entry<E, F>(&self, local_id: &str, edit: F) -> Result<LocalRecord>
    where
        E: Entry,
        F: FnOnce(&mut E),
    {
        let record = self
            .get(local_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(local_id.to_string()))?;

        let mut entry: E = record.decode()?;
        edit(&mut entry);

        let (record, _) = self
            .update(
                local_id,
                &Mutation::Amend {
                    fields: entry.to_fields()?,
                },
            )
            .await?;
        Ok(record)
    }

    /// Permanently delete a record. Deleting a missing record is not an error.
    pub async fn destroy(&self, local_id: &str) -> Result<bool> {
        let removed = db::delete_record(&self.pool, local_id).await?;
        tracing::trace!(local_id, removed, "record destroyed");
        Ok(removed)
    }

    /// Delete a record only if it was not amended since `revision` was read.
    pub async fn destroy_if_unchanged(&self, local_id: &str, revision: Revision) -> Result<bool> {
        Ok(db::delete_record_at_revision(&self.pool, local_id, revision).await?)
    }

    pub async fn count(&self, class: EntityClass, state: SyncState) -> Result<u64> {
        let total = db::count_records(&self.pool, class, state).await?;
        Ok(total.max(0) as u64)
    }

    /// Return every dead-lettered record of `class` to the pending queue.
    pub async fn requeue_dead_letters(&self, class: EntityClass) -> Result<usize> {
        let parked = self.query(class, SyncState::DeadLetter).await?;

        let mut requeued = 0;
        for record in parked {
            match self.update(&record.local_id, &Mutation::Requeue).await {
                Ok(_) => requeued += 1,
                // Amended or requeued by someone else in the meantime.
                Err(StoreError::Engine(fieldsync_engine::Error::NotDeadLettered(_)))
                | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if requeued > 0 {
            tracing::info!(class = %class, requeued, "dead-lettered records requeued");
        }
        Ok(requeued)
    }
}

/// Wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
