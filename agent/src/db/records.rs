//! Database operations for the local_records table.

use crate::error::StoreError;
use fieldsync_engine::{EntityClass, LocalRecord, Metadata, Revision, SyncState};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A stored record row from the database.
#[derive(Debug)]
pub struct StoredRecord {
    pub seq: i64,
    pub local_id: String,
    pub entity_class: String,
    pub remote_id: Option<String>,
    pub sync_state: String,
    pub fields: String,
    pub revision: i64,
    pub rejections: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            seq: row.try_get("seq")?,
            local_id: row.try_get("local_id")?,
            entity_class: row.try_get("entity_class")?,
            remote_id: row.try_get("remote_id")?,
            sync_state: row.try_get("sync_state")?,
            fields: row.try_get("fields")?,
            revision: row.try_get("revision")?,
            rejections: row.try_get("rejections")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// Convert the database row to a fieldsync-engine record.
    pub fn to_record(&self) -> Result<LocalRecord, StoreError> {
        let class: EntityClass = self.entity_class.parse().map_err(|e| self.corrupt(e))?;
        let sync_state: SyncState = self.sync_state.parse().map_err(|e| self.corrupt(e))?;
        let fields = serde_json::from_str(&self.fields).map_err(|e| self.corrupt(e))?;

        Ok(LocalRecord {
            local_id: self.local_id.clone(),
            class,
            remote_id: self.remote_id.clone(),
            sync_state,
            fields,
            metadata: Metadata {
                created_at: self.created_at.max(0) as u64,
                updated_at: self.updated_at.max(0) as u64,
                revision: self.revision.max(0) as u64,
                rejections: self.rejections.clamp(0, u32::MAX as i64) as u32,
                last_error: self.last_error.clone(),
            },
        })
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> StoreError {
        StoreError::Corrupt {
            local_id: self.local_id.clone(),
            reason: reason.to_string(),
        }
    }
}

const COLUMNS: &str = "seq, local_id, entity_class, remote_id, sync_state, fields, \
                       revision, rejections, last_error, created_at, updated_at";

/// Insert a new record.
pub async fn insert_record(pool: &SqlitePool, record: &LocalRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO local_records (
            local_id, entity_class, remote_id, sync_state, fields,
            revision, rejections, last_error, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&record.local_id)
    .bind(record.class.as_str())
    .bind(&record.remote_id)
    .bind(record.sync_state.as_str())
    .bind(record.fields.to_string())
    .bind(record.metadata.revision as i64)
    .bind(record.metadata.rejections as i64)
    .bind(&record.metadata.last_error)
    .bind(record.metadata.created_at as i64)
    .bind(record.metadata.updated_at as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a record by local id.
pub async fn get_record(
    pool: &SqlitePool,
    local_id: &str,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM local_records WHERE local_id = ?1");
    sqlx::query_as::<_, StoredRecord>(&sql)
        .bind(local_id)
        .fetch_optional(pool)
        .await
}

/// Get the records of a class in a given state, in creation order.
pub async fn get_records_in_state(
    pool: &SqlitePool,
    class: EntityClass,
    state: SyncState,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {COLUMNS} FROM local_records \
         WHERE entity_class = ?1 AND sync_state = ?2 \
         ORDER BY seq"
    );
    sqlx::query_as::<_, StoredRecord>(&sql)
        .bind(class.as_str())
        .bind(state.as_str())
        .fetch_all(pool)
        .await
}

/// Write `after` over the row, provided the row still matches `before`.
///
/// Returns `false` when another writer changed the row (or removed it) since
/// `before` was read.
pub async fn compare_and_set(
    pool: &SqlitePool,
    before: &LocalRecord,
    after: &LocalRecord,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE local_records SET
            remote_id = ?1,
            sync_state = ?2,
            fields = ?3,
            revision = ?4,
            rejections = ?5,
            last_error = ?6,
            updated_at = ?7
        WHERE local_id = ?8
          AND revision = ?9
          AND sync_state = ?10
          AND remote_id IS ?11
        "#,
    )
    .bind(&after.remote_id)
    .bind(after.sync_state.as_str())
    .bind(after.fields.to_string())
    .bind(after.metadata.revision as i64)
    .bind(after.metadata.rejections as i64)
    .bind(&after.metadata.last_error)
    .bind(after.metadata.updated_at as i64)
    .bind(&before.local_id)
    .bind(before.metadata.revision as i64)
    .bind(before.sync_state.as_str())
    .bind(&before.remote_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete a record. Returns whether a row was removed.
pub async fn delete_record(pool: &SqlitePool, local_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM local_records WHERE local_id = ?1")
        .bind(local_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a record only if it is still at `revision`.
pub async fn delete_record_at_revision(
    pool: &SqlitePool,
    local_id: &str,
    revision: Revision,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM local_records WHERE local_id = ?1 AND revision = ?2")
        .bind(local_id)
        .bind(revision as i64)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Count the records of a class in a given state.
pub async fn count_records(
    pool: &SqlitePool,
    class: EntityClass,
    state: SyncState,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total FROM local_records WHERE entity_class = ?1 AND sync_state = ?2",
    )
    .bind(class.as_str())
    .bind(state.as_str())
    .fetch_one(pool)
    .await?;

    row.try_get("total")
}
