//! # Fieldsync Engine
//!
//! Record model and reconciliation logic for offline-first field capture.
//!
//! Field staff record attendance, panic alerts, checklist answers, visitor log
//! lines and location pings on a device that is often offline. Every record is
//! written locally first as `pending` and later mirrored to an authoritative
//! remote store. This crate holds the rules of that lifecycle; the storage,
//! network and scheduling around it live in `fieldsync-agent`.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, network or clocks
//! - **Single writer per record**: each record is authored by one device, so
//!   there is no merge logic, only write-once identity reconciliation
//! - **Explicit transitions**: records change only through [`Mutation`]s
//!
//! ## Core Concepts
//!
//! ### Entity classes
//!
//! [`EntityClass`] names the five record classes and their sync policy: the
//! fixed drain order ([`EntityClass::SYNC_ORDER`]), whether a synced record is
//! retained or reclaimed ([`Retention`]), and whether the remote write is an
//! upsert or a plain insert ([`WriteMode`]).
//!
//! ### Records
//!
//! A [`LocalRecord`] carries:
//! - a local id, stable for the record's lifetime
//! - a write-once remote id, absent until the first confirmed write
//! - a [`SyncState`]
//! - domain fields, validated by the class [`Schema`]
//! - [`Metadata`] with a revision used as the compare-and-set token
//!
//! ### Reconciliation
//!
//! [`build_payload`] turns a pending batch into the ordered remote payload and
//! [`Reconciler::plan`] maps the positionally aligned response back onto the
//! batch.
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldsync_engine::{
//!     build_payload, AlertEntry, EntityClass, Entry, LocalRecord, Mutation, Reconciler,
//!     ReconcileStep, Schema,
//! };
//! use chrono::{TimeZone, Utc};
//!
//! let schema = Schema::standard();
//! let alert = AlertEntry::new("guard-7", "panic", Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap());
//! let fields = alert.to_fields().unwrap();
//! schema.validate(EntityClass::Alert, &fields).unwrap();
//!
//! let mut record = LocalRecord::new("local-1", EntityClass::Alert, fields, 1706745600000);
//! let payload = build_payload(EntityClass::Alert, std::slice::from_ref(&record)).unwrap();
//! assert!(payload[0].get("id").is_none());
//!
//! // The remote answered with one identifier per submitted record.
//! let plan = Reconciler::plan(EntityClass::Alert, std::slice::from_ref(&record), &["r1".to_string()]).unwrap();
//! if let ReconcileStep::MarkSynced { remote_id, revision, .. } = &plan.steps[0] {
//!     Mutation::MarkSynced { remote_id: remote_id.clone(), revision: *revision }
//!         .apply(&mut record, &schema, 1706745601000)
//!         .unwrap();
//! }
//! assert_eq!(record.remote_id.as_deref(), Some("r1"));
//! ```

pub mod entity;
pub mod entry;
pub mod error;
pub mod mutation;
pub mod payload;
pub mod reconcile;
pub mod record;
pub mod schema;

// Re-export main types at crate root
pub use entity::{EntityClass, Retention, WriteMode};
pub use entry::{
    AlertEntry, AttendanceEntry, ChecklistEntry, Entry, LocationPingEntry, VisitorEntry,
};
pub use error::Error;
pub use mutation::{Mutation, MutationEffect};
pub use payload::{build_payload, record_payload};
pub use reconcile::{ReconcilePlan, ReconcileStep, Reconciler};
pub use record::{LocalRecord, Metadata, SyncState};
pub use schema::{CollectionSchema, FieldDef, FieldType, Schema};

/// Type aliases for clarity
pub type LocalId = String;
pub type RemoteId = String;
pub type Timestamp = u64;
pub type Revision = u64;
