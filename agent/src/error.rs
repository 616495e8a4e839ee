//! Unified error handling for the agent.

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::location::SchedulerError;
use crate::session::SessionError;
use fieldsync_engine::LocalId;

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Engine error: {0}")]
    Engine(#[from] fieldsync_engine::Error),

    #[error("Record not found: {0}")]
    NotFound(LocalId),

    #[error("Record {0} was changed concurrently")]
    Conflict(LocalId),

    #[error("Corrupt record {local_id}: {reason}")]
    Corrupt { local_id: LocalId, reason: String },
}

/// Agent error type.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] fieldsync_engine::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
