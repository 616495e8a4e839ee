//! Remote payload construction.
//!
//! A batch payload is an ordered array with one object per record. Records that
//! already carry a remote id are addressed by it (`id`), which turns the remote
//! write into an update of that row; the others omit `id` and become inserts.

use crate::{error::Result, EntityClass, Error, LocalRecord, WriteMode};
use serde_json::Value;

/// Build the payload for a single record.
pub fn record_payload(record: &LocalRecord) -> Result<Value> {
    let mut body = record
        .fields
        .as_object()
        .cloned()
        .ok_or_else(|| Error::InvalidFields {
            class: record.class,
            reason: "stored fields are not an object".into(),
        })?;

    if record.class.write_mode() == WriteMode::Upsert {
        if let Some(remote_id) = &record.remote_id {
            body.insert("id".to_string(), Value::String(remote_id.clone()));
        }
    }

    Ok(Value::Object(body))
}

/// Build the ordered batch payload for `records`, all of which must belong to `class`.
///
/// Position `i` of the result describes `records[i]`.
pub fn build_payload(class: EntityClass, records: &[LocalRecord]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|record| {
            if record.class != class {
                return Err(Error::ClassMismatch {
                    local_id: record.local_id.clone(),
                    expected: class,
                    actual: record.class,
                });
            }
            record_payload(record)
        })
        .collect()
}
