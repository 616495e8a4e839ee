//! Entity classes and their per-class sync policies.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five record classes captured on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Alert,
    Attendance,
    Checklist,
    Visitor,
    LocationPing,
}

/// What happens to a local record once the remote store has confirmed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Kept as a local audit trail in the `synced` state
    Retain,
    /// Destroyed once durably mirrored remotely
    Reclaim,
}

/// How a class is written to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Insert when no `id` is supplied, update the addressed row otherwise
    Upsert,
    /// Plain insert; payloads never carry an `id`
    Insert,
}

impl EntityClass {
    /// Order in which a sync cycle drains the classes.
    ///
    /// Alerts go first because they are latency-sensitive safety events.
    pub const SYNC_ORDER: [EntityClass; 5] = [
        EntityClass::Alert,
        EntityClass::Attendance,
        EntityClass::Checklist,
        EntityClass::Visitor,
        EntityClass::LocationPing,
    ];

    /// Storage name of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Alert => "alert",
            EntityClass::Attendance => "attendance",
            EntityClass::Checklist => "checklist",
            EntityClass::Visitor => "visitor",
            EntityClass::LocationPing => "location_ping",
        }
    }

    /// Name of the remote table backing this class.
    pub fn remote_table(&self) -> &'static str {
        match self {
            EntityClass::Alert => "panic_alerts",
            EntityClass::Attendance => "attendance_logs",
            EntityClass::Checklist => "checklist_responses",
            EntityClass::Visitor => "visitors",
            EntityClass::LocationPing => "gps_tracking",
        }
    }

    pub fn retention(&self) -> Retention {
        match self {
            EntityClass::LocationPing => Retention::Reclaim,
            _ => Retention::Retain,
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        match self {
            EntityClass::LocationPing => WriteMode::Insert,
            _ => WriteMode::Upsert,
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityClass::SYNC_ORDER
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| Error::UnknownEntityClass(s.to_string()))
    }
}
