//! Error types for the fieldsync engine.

use crate::{EntityClass, LocalId, RemoteId};
use thiserror::Error;

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("unknown entity class: {0}")]
    UnknownEntityClass(String),

    #[error("unknown sync state: {0}")]
    UnknownSyncState(String),

    #[error("invalid fields for {class}: {reason}")]
    InvalidFields { class: EntityClass, reason: String },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("record {local_id} is a {actual}, not a {expected}")]
    ClassMismatch {
        local_id: LocalId,
        expected: EntityClass,
        actual: EntityClass,
    },

    // Record state errors
    #[error("remote id of {local_id} is already {existing}, refusing {proposed}")]
    RemoteIdConflict {
        local_id: LocalId,
        existing: RemoteId,
        proposed: RemoteId,
    },

    #[error("record {0} is not dead-lettered")]
    NotDeadLettered(LocalId),

    #[error("record {0} is not pending")]
    NotPending(LocalId),

    // Reconciliation errors
    #[error("remote returned {got} identifiers for a batch of {expected}")]
    MisalignedResponse { expected: usize, got: usize },

    #[error("remote returned an empty identifier at position {0}")]
    EmptyRemoteId(usize),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
