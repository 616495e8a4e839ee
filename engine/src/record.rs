//! Local record types.

use crate::{error::Result, EntityClass, Entry, Error, LocalId, RemoteId, Revision, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synchronization state of a local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Not yet confirmed present in the remote store
    Pending,
    /// Remote identity confirmed and stored
    Synced,
    /// Permanently rejected by the remote side; parked until requeued
    DeadLetter,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
            SyncState::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncState::Pending),
            "synced" => Ok(SyncState::Synced),
            "dead_letter" => Ok(SyncState::DeadLetter),
            other => Err(Error::UnknownSyncState(other.to_string())),
        }
    }
}

/// Metadata associated with a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When the record was created (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When the record was last written (milliseconds since epoch)
    pub updated_at: Timestamp,
    /// Incremented on every domain amendment, starts at 1
    pub revision: Revision,
    /// Permanent remote rejections since the last amendment or requeue
    pub rejections: u32,
    /// Reason of the last remote rejection
    pub last_error: Option<String>,
}

impl Metadata {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            created_at: timestamp,
            updated_at: timestamp,
            revision: 1,
            rejections: 0,
            last_error: None,
        }
    }
}

/// A domain record held in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    /// Stable for the record's whole local lifetime
    pub local_id: LocalId,
    pub class: EntityClass,
    /// Write-once authoritative identity
    pub remote_id: Option<RemoteId>,
    pub sync_state: SyncState,
    /// Domain fields, keyed by remote column name
    pub fields: serde_json::Value,
    pub metadata: Metadata,
}

impl LocalRecord {
    /// Create a new pending record with no remote identity.
    pub fn new(
        local_id: impl Into<LocalId>,
        class: EntityClass,
        fields: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            class,
            remote_id: None,
            sync_state: SyncState::Pending,
            fields,
            metadata: Metadata::new(timestamp),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.sync_state == SyncState::Pending
    }

    pub fn revision(&self) -> Revision {
        self.metadata.revision
    }

    /// Decode the fields as a typed entry of the record's class.
    pub fn decode<E: Entry>(&self) -> Result<E> {
        if self.class != E::CLASS {
            return Err(Error::ClassMismatch {
                local_id: self.local_id.clone(),
                expected: E::CLASS,
                actual: self.class,
            });
        }
        E::from_fields(&self.fields)
    }
}
