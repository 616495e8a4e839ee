//! Authenticated session lookup.
//!
//! Background work runs without UI, so the identity it records under must come
//! from state persisted by the foreground app at sign-in.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Sessions without an explicit expiry are valid this long after issue.
pub const SESSION_LIFETIME_HOURS: i64 = 8;

/// The signed-in user and the employee profile records are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub employee_id: String,
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read session: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse session: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of the current identity.
pub trait SessionProvider: Send + Sync {
    /// The identity of the signed-in user, or `None` when nobody is signed in
    /// or the session has expired.
    fn current_identity(&self) -> Result<Option<Identity>, SessionError>;
}

/// Session as written by the app at sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub user_id: String,
    /// Absent until the user's employee profile has been resolved
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let expiry = self.expires_at.or_else(|| {
            self.issued_at
                .map(|issued| issued + Duration::hours(SESSION_LIFETIME_HOURS))
        });
        matches!(expiry, Some(expiry) if now >= expiry)
    }

    fn identity_at(&self, now: DateTime<Utc>) -> Option<Identity> {
        if self.is_expired_at(now) {
            return None;
        }
        let employee_id = self.employee_id.clone()?;
        Some(Identity {
            user_id: self.user_id.clone(),
            employee_id,
        })
    }
}

/// Reads the session from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    path: PathBuf,
}

impl FileSessionProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session; a missing file means nobody is signed in.
    pub fn read(&self) -> Result<Option<PersistedSession>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Persist `session`, replacing any previous one.
    pub fn write(&self, session: &PersistedSession) -> Result<(), SessionError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Access token of a live session.
    pub fn access_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self
            .read()?
            .filter(|session| !session.is_expired_at(Utc::now()))
            .and_then(|session| session.access_token))
    }
}

impl SessionProvider for FileSessionProvider {
    fn current_identity(&self) -> Result<Option<Identity>, SessionError> {
        Ok(self
            .read()?
            .and_then(|session| session.identity_at(Utc::now())))
    }
}
