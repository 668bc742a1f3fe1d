//! Typed record contract.
//!
//! # Responsibility
//! - Define the trait application types implement to be stored as entities.
//! - Replace dynamic key/value assignment with validated per-field setters.
//!
//! # Invariants
//! - `RecordId` is stable for the record lifetime and never reused.
//! - `set_field` rejects unknown field names instead of ignoring them.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::model::value::{FieldMap, Value};

/// Stable identifier of one stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn parse_str(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Field assignment failure raised by a record setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The record type has no settable field with this name.
    UnknownField(String),
    /// The value kind does not fit the field.
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl FieldError {
    pub fn unknown(field: &str) -> Self {
        Self::UnknownField(field.to_string())
    }

    pub fn mismatch(field: &str, expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            expected,
            found: found.kind_name(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(field) => write!(f, "unknown field `{field}`"),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field `{field}` expects {expected}, got {found}"),
        }
    }
}

impl Error for FieldError {}

/// Application type persisted as one schema entity.
///
/// Implementors map their struct fields to schema field names. The store
/// builds instances through [`Record::blank`] followed by one
/// [`Record::set_field`] call per stored field.
///
/// # Example
///
/// ```
/// use recordstore_core::{FieldError, FieldMap, Record, RecordId, Value};
///
/// struct Tag {
///     id: RecordId,
///     label: String,
/// }
///
/// impl Record for Tag {
///     const ENTITY: &'static str = "Tag";
///     const TYPE_NAME: &'static str = "Tag";
///
///     fn blank(id: RecordId) -> Self {
///         Self { id, label: String::new() }
///     }
///
///     fn id(&self) -> RecordId {
///         self.id
///     }
///
///     fn set_field(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
///         match field {
///             "label" => self.label = value.into_text(field)?,
///             other => return Err(FieldError::unknown(other)),
///         }
///         Ok(())
///     }
///
///     fn to_fields(&self) -> FieldMap {
///         FieldMap::from([("label".to_string(), Value::from(self.label.as_str()))])
///     }
/// }
/// ```
pub trait Record: Sized {
    /// Schema entity this type is stored as.
    const ENTITY: &'static str;
    /// Backing type name the schema must declare for `ENTITY`.
    const TYPE_NAME: &'static str;

    /// Creates an empty record carrying `id`.
    fn blank(id: RecordId) -> Self;

    fn id(&self) -> RecordId;

    /// Validated setter for one field.
    fn set_field(&mut self, field: &str, value: Value) -> Result<(), FieldError>;

    /// Current field values, keyed by schema field name.
    fn to_fields(&self) -> FieldMap;

    /// Applies every entry of `fields` through [`Record::set_field`].
    ///
    /// Stops at the first failing field.
    fn apply_fields(&mut self, fields: &FieldMap) -> Result<(), FieldError> {
        for (field, value) in fields {
            self.set_field(field, value.clone())?;
        }
        Ok(())
    }
}
