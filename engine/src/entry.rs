//! Typed domain entries for the five record classes.
//!
//! Entries serialize with the remote column names, so the stored field map of a
//! record is exactly the body of its remote row minus the `id`.

use crate::{error::Result, EntityClass, Error};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A domain entry that can be stored as a local record.
pub trait Entry: Serialize + DeserializeOwned {
    /// The class this entry is stored under.
    const CLASS: EntityClass;

    /// Convert the entry into its stored field map.
    fn to_fields(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidFields {
            class: Self::CLASS,
            reason: e.to_string(),
        })
    }

    /// Rebuild the entry from a stored field map.
    fn from_fields(fields: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(fields.clone()).map_err(|e| Error::InvalidFields {
            class: Self::CLASS,
            reason: e.to_string(),
        })
    }
}

/// A check-in / check-out log for one employee and day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub employee_id: String,
    pub log_date: NaiveDate,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    /// Reference to the uploaded selfie; the upload itself happens elsewhere
    pub check_in_selfie_url: Option<String>,
    pub is_auto_punch_out: bool,
}

impl AttendanceEntry {
    /// A check-in at `at`, dated on the UTC day of `at`.
    pub fn check_in(employee_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            employee_id: employee_id.into(),
            log_date: at.date_naive(),
            check_in_time: Some(at),
            check_out_time: None,
            check_in_latitude: None,
            check_in_longitude: None,
            check_in_selfie_url: None,
            is_auto_punch_out: false,
        }
    }
}

impl Entry for AttendanceEntry {
    const CLASS: EntityClass = EntityClass::Attendance;
}

/// A panic or incident alert raised by a guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub guard_id: String,
    pub alert_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub is_resolved: bool,
    pub alert_time: DateTime<Utc>,
}

impl AlertEntry {
    pub fn new(
        guard_id: impl Into<String>,
        alert_type: impl Into<String>,
        alert_time: DateTime<Utc>,
    ) -> Self {
        Self {
            guard_id: guard_id.into(),
            alert_type: alert_type.into(),
            latitude: None,
            longitude: None,
            description: None,
            is_resolved: false,
            alert_time,
        }
    }
}

impl Entry for AlertEntry {
    const CLASS: EntityClass = EntityClass::Alert;
}

/// Answers to a checklist (patrol, PPE check, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub checklist_id: String,
    pub employee_id: String,
    pub response_date: NaiveDate,
    pub responses: serde_json::Value,
    pub is_complete: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Entry for ChecklistEntry {
    const CLASS: EntityClass = EntityClass::Checklist;
}

/// A visitor log line written at the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorEntry {
    pub visitor_name: String,
    pub phone: Option<String>,
    pub flat_id: Option<String>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub entry_guard_id: Option<String>,
}

impl Entry for VisitorEntry {
    const CLASS: EntityClass = EntityClass::Visitor;
}

/// One background location fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPingEntry {
    pub employee_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub tracked_at: DateTime<Utc>,
    pub is_mock_location: bool,
    pub battery_level: Option<f64>,
}

impl Entry for LocationPingEntry {
    const CLASS: EntityClass = EntityClass::LocationPing;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Schema;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn entries_validate_against_the_standard_schema() {
        let schema = Schema::standard();

        let attendance = AttendanceEntry::check_in("emp-1", at(9));
        schema
            .validate(EntityClass::Attendance, &attendance.to_fields().unwrap())
            .unwrap();

        let alert = AlertEntry::new("g-1", "panic", at(10));
        schema
            .validate(EntityClass::Alert, &alert.to_fields().unwrap())
            .unwrap();

        let checklist = ChecklistEntry {
            checklist_id: "ppe".into(),
            employee_id: "emp-1".into(),
            response_date: at(9).date_naive(),
            responses: json!([{"item": "helmet", "ok": true}]),
            is_complete: true,
            submitted_at: Some(at(11)),
        };
        schema
            .validate(EntityClass::Checklist, &checklist.to_fields().unwrap())
            .unwrap();

        let visitor = VisitorEntry {
            visitor_name: "Asha".into(),
            phone: Some("+91 90000 00000".into()),
            flat_id: Some("B-204".into()),
            entry_time: at(12),
            exit_time: None,
            entry_guard_id: Some("g-1".into()),
        };
        schema
            .validate(EntityClass::Visitor, &visitor.to_fields().unwrap())
            .unwrap();

        let ping = LocationPingEntry {
            employee_id: "emp-1".into(),
            latitude: 12.97,
            longitude: 77.59,
            tracked_at: at(13),
            is_mock_location: false,
            battery_level: None,
        };
        schema
            .validate(EntityClass::LocationPing, &ping.to_fields().unwrap())
            .unwrap();
    }

    #[test]
    fn fields_use_remote_column_names() {
        let fields = AlertEntry::new("g-1", "fire", at(10)).to_fields().unwrap();
        assert_eq!(fields["guard_id"], "g-1");
        assert_eq!(fields["alert_time"], "2026-02-01T10:00:00Z");
        assert_eq!(fields["is_resolved"], false);
    }

    #[test]
    fn check_in_dates_the_log_on_the_check_in_day() {
        let entry = AttendanceEntry::check_in("emp-1", at(23));
        assert_eq!(entry.log_date.to_string(), "2026-02-01");
    }

    #[test]
    fn from_fields_reports_the_class() {
        let result = VisitorEntry::from_fields(&json!({"visitor_name": 5}));
        assert!(matches!(
            result,
            Err(Error::InvalidFields { class: EntityClass::Visitor, .. })
        ));
    }
}
