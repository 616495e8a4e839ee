//! Field schemas and validation.
//!
//! Each entity class has a fixed set of fields mirroring the columns of its
//! remote table. Field maps are validated before they reach local storage, so
//! a record that cannot possibly be accepted remotely is refused at capture time.

use crate::{error::Result, EntityClass, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Float,
    Bool,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// RFC 3339 instant
    DateTime,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Date => write!(f, "Date"),
            FieldType::DateTime => write!(f, "DateTime"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a class schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&serde_json::Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(serde_json::Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(serde_json::Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Date => value
                .as_str()
                .is_some_and(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            FieldType::DateTime => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(_) => "Number",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Schema for one entity class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub class: EntityClass,
    pub fields: Vec<FieldDef>,
}

impl CollectionSchema {
    pub fn new(class: EntityClass, fields: Vec<FieldDef>) -> Self {
        Self { class, fields }
    }

    /// Validate a field map against this schema.
    ///
    /// Undeclared keys are refused, including `id`: the remote identity lives
    /// beside the fields, never inside them.
    pub fn validate_payload(&self, payload: &serde_json::Value) -> Result<()> {
        let obj = payload.as_object().ok_or_else(|| Error::InvalidFields {
            class: self.class,
            reason: "fields must be an object".into(),
        })?;

        if let Some(unknown) = obj
            .keys()
            .find(|key| !self.fields.iter().any(|f| &f.name == *key))
        {
            return Err(Error::InvalidFields {
                class: self.class,
                reason: format!("unknown field '{unknown}'"),
            });
        }

        for field in &self.fields {
            field.validate(obj.get(&field.name))?;
        }

        Ok(())
    }
}

/// Schemas for every entity class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub collections: HashMap<EntityClass, CollectionSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Builder-style method to add a class schema.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.collections.insert(collection.class, collection);
        self
    }

    /// The schemas of the five record classes, matching the remote tables.
    pub fn standard() -> Self {
        use FieldType::*;

        Schema::new()
            .with_collection(CollectionSchema::new(
                EntityClass::Attendance,
                vec![
                    FieldDef::required("employee_id", String),
                    FieldDef::required("log_date", Date),
                    FieldDef::optional("check_in_time", DateTime),
                    FieldDef::optional("check_out_time", DateTime),
                    FieldDef::optional("check_in_latitude", Float),
                    FieldDef::optional("check_in_longitude", Float),
                    FieldDef::optional("check_in_selfie_url", String),
                    FieldDef::required("is_auto_punch_out", Bool),
                ],
            ))
            .with_collection(CollectionSchema::new(
                EntityClass::Alert,
                vec![
                    FieldDef::required("guard_id", String),
                    FieldDef::required("alert_type", String),
                    FieldDef::optional("latitude", Float),
                    FieldDef::optional("longitude", Float),
                    FieldDef::optional("description", String),
                    FieldDef::required("is_resolved", Bool),
                    FieldDef::required("alert_time", DateTime),
                ],
            ))
            .with_collection(CollectionSchema::new(
                EntityClass::Checklist,
                vec![
                    FieldDef::required("checklist_id", String),
                    FieldDef::required("employee_id", String),
                    FieldDef::required("response_date", Date),
                    FieldDef::required("responses", Json),
                    FieldDef::required("is_complete", Bool),
                    FieldDef::optional("submitted_at", DateTime),
                ],
            ))
            .with_collection(CollectionSchema::new(
                EntityClass::Visitor,
                vec![
                    FieldDef::required("visitor_name", String),
                    FieldDef::optional("phone", String),
                    FieldDef::optional("flat_id", String),
                    FieldDef::required("entry_time", DateTime),
                    FieldDef::optional("exit_time", DateTime),
                    FieldDef::optional("entry_guard_id", String),
                ],
            ))
            .with_collection(CollectionSchema::new(
                EntityClass::LocationPing,
                vec![
                    FieldDef::required("employee_id", String),
                    FieldDef::required("latitude", Float),
                    FieldDef::required("longitude", Float),
                    FieldDef::required("tracked_at", DateTime),
                    FieldDef::required("is_mock_location", Bool),
                    FieldDef::optional("battery_level", Float),
                ],
            ))
    }

    pub fn get_collection(&self, class: EntityClass) -> Option<&CollectionSchema> {
        self.collections.get(&class)
    }

    /// Validate a field map for the given class.
    pub fn validate(&self, class: EntityClass, fields: &serde_json::Value) -> Result<()> {
        self.collections
            .get(&class)
            .ok_or_else(|| Error::UnknownEntityClass(class.to_string()))?
            .validate_payload(fields)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::standard()
    }
}
