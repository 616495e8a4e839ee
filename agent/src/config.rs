//! Configuration management for the agent.
//!
//! The binary reads the environment (with `.env` support through `dotenvy`);
//! hosts embedding the library through the C ABI pass the same settings as a
//! JSON object instead.

use crate::location::TrackingOptions;
use crate::sync::SyncOptions;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite URL of the local store, e.g. `sqlite://fieldsync.db`
    pub database_url: String,
    /// Base URL of the remote store
    pub remote_url: String,
    /// Public API key sent with every remote request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Where the authenticated session is persisted
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Permanent rejections before a record is dead-lettered; 0 disables
    #[serde(default = "default_dead_letter_after")]
    pub dead_letter_after: u32,
    #[serde(default = "default_gps_interval_secs")]
    pub gps_interval_secs: u64,
    #[serde(default = "default_gps_distance_meters")]
    pub gps_distance_meters: f64,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_probe_interval_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_dead_letter_after() -> u32 {
    5
}

fn default_gps_interval_secs() -> u64 {
    300
}

fn default_gps_distance_meters() -> f64 {
    50.0
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("FIELDSYNC_DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;
        let remote_url =
            env::var("FIELDSYNC_REMOTE_URL").map_err(|_| ConfigError::MissingRemoteUrl)?;

        let api_key = env::var("FIELDSYNC_API_KEY").ok();
        let session_path = env::var("FIELDSYNC_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_path());

        Ok(Self {
            database_url,
            remote_url,
            api_key,
            session_path,
            sync_interval_secs: parse_var(
                "FIELDSYNC_SYNC_INTERVAL_SECS",
                default_sync_interval_secs(),
            )?,
            probe_interval_secs: parse_var(
                "FIELDSYNC_PROBE_INTERVAL_SECS",
                default_probe_interval_secs(),
            )?,
            request_timeout_secs: parse_var(
                "FIELDSYNC_REQUEST_TIMEOUT_SECS",
                default_request_timeout_secs(),
            )?,
            dead_letter_after: parse_var(
                "FIELDSYNC_DEAD_LETTER_AFTER",
                default_dead_letter_after(),
            )?,
            gps_interval_secs: parse_var(
                "FIELDSYNC_GPS_INTERVAL_SECS",
                default_gps_interval_secs(),
            )?,
            gps_distance_meters: parse_var(
                "FIELDSYNC_GPS_DISTANCE_METERS",
                default_gps_distance_meters(),
            )?,
        })
    }

    /// Parse configuration passed by an embedding host.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dead_letter_after: self.dead_letter_after,
        }
    }

    pub fn tracking_options(&self) -> TrackingOptions {
        TrackingOptions {
            interval_secs: self.gps_interval_secs,
            distance_meters: self.gps_distance_meters,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FIELDSYNC_DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("FIELDSYNC_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Json(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_config_fills_defaults() {
        let config = Config::from_json(
            r#"{"databaseUrl": "sqlite://fieldsync.db", "remoteUrl": "https://example.test"}"#,
        )
        .unwrap();

        assert_eq!(config.session_path, PathBuf::from("session.json"));
        assert_eq!(config.sync_interval(), Duration::from_secs(60));
        assert_eq!(config.dead_letter_after, 5);

        let tracking = config.tracking_options();
        assert_eq!(tracking.interval_secs, 300);
        assert_eq!(tracking.distance_meters, 50.0);
    }

    #[test]
    fn json_config_requires_urls() {
        let result = Config::from_json(r#"{"databaseUrl": "sqlite://fieldsync.db"}"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = parse_value::<u64>("FIELDSYNC_SYNC_INTERVAL_SECS", "soon").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for FIELDSYNC_SYNC_INTERVAL_SECS: \"soon\""
        );
        assert_eq!(parse_value::<u32>("X", " 7 ").unwrap(), 7);
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let mut config = Config::from_json(
            r#"{"databaseUrl": "sqlite://a.db", "remoteUrl": "https://example.test"}"#,
        )
        .unwrap();
        config.probe_interval_secs = 0;
        assert_eq!(config.probe_interval(), Duration::from_secs(1));
    }
}
