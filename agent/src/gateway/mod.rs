//! Remote store gateway.
//!
//! The remote store is a set of tables, one per entity class, accepting batch
//! writes and answering with the written rows' identifiers in request order.

mod http;

pub use http::HttpGateway;

use async_trait::async_trait;
use fieldsync_engine::{EntityClass, RemoteId};
use serde_json::Value;

/// Errors from the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("remote rejected the write ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether retrying the same payload can never succeed.
    ///
    /// Client errors are permanent, except request timeouts and rate limiting.
    /// Everything else (transport failures, server errors, responses that did
    /// not parse) is retried on the next cycle.
    pub fn is_permanent(&self) -> bool {
        match self {
            GatewayError::Rejected { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            _ => false,
        }
    }
}

/// Write access to the remote store.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Write a batch to the table of `class`.
    ///
    /// Objects carrying an `id` update that row, the others are inserted. For
    /// insert-only classes every object is inserted. On success the result holds
    /// one identifier per payload object, in payload order.
    async fn upsert(
        &self,
        class: EntityClass,
        payload: Vec<Value>,
    ) -> Result<Vec<RemoteId>, GatewayError>;

    /// Insert a single object and return its identifier.
    async fn insert(&self, class: EntityClass, payload: Value) -> Result<RemoteId, GatewayError>;
}
