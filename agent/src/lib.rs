//! # Fieldsync Agent
//!
//! Device runtime for offline-first field capture: the durable local store, the
//! sync orchestrator that drains it to the remote store, connectivity tracking,
//! and the background location task. The record rules themselves live in
//! `fieldsync-engine`.
//!
//! The agent is used three ways:
//! - as a library, by embedding Rust hosts
//! - through the C ABI in [`ffi`], by the mobile app and its background tasks
//! - as the `fieldsync-agent` binary, a long-running sync daemon

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod ffi;
pub mod gateway;
pub mod location;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;

pub use config::{Config, ConfigError};
pub use connectivity::{
    spawn_reachability_probe, spawn_sync_on_reconnect, Connectivity, ConnectivityMonitor,
};
pub use error::{AgentError, Result, StoreError};
pub use gateway::{GatewayError, HttpGateway, RemoteGateway};
pub use location::{
    start_tracking, stop_tracking, CaptureOutcome, InMemoryScheduler, LocationCapture,
    LocationFix, SchedulerError, TaskScheduler, TrackingOptions, GPS_TASK_NAME,
};
pub use session::{FileSessionProvider, Identity, PersistedSession, SessionError, SessionProvider};
pub use state::AppState;
pub use store::LocalStore;
pub use sync::{
    spawn_periodic_sync, ClassOutcome, ClassReport, SingleFlight, SyncOptions, SyncOrchestrator,
    SyncReport,
};
