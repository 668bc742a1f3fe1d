//! Record validation against the schema before persistence.
//!
//! # Invariants
//! - Only declared fields are stored.
//! - Required fields are present and non-null.
//! - Every non-null value fits its declared field kind.
//! - Reals are finite; JSON storage has no encoding for NaN or infinity.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::schema::{FieldKind, Schema};
use crate::model::value::{FieldMap, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    UnknownEntity(String),
    UnknownField {
        entity: String,
        field: String,
    },
    WrongKind {
        entity: String,
        field: String,
        expected: FieldKind,
        found: &'static str,
    },
    MissingRequired {
        entity: String,
        field: String,
    },
    NonFinite {
        entity: String,
        field: String,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(entity) => write!(f, "entity `{entity}` is not in the model"),
            Self::UnknownField { entity, field } => {
                write!(f, "entity `{entity}` has no field `{field}`")
            }
            Self::WrongKind {
                entity,
                field,
                expected,
                found,
            } => write!(
                f,
                "field `{entity}.{field}` expects {}, got {found}",
                expected.as_str()
            ),
            Self::MissingRequired { entity, field } => {
                write!(f, "required field `{entity}.{field}` is missing")
            }
            Self::NonFinite { entity, field } => {
                write!(f, "field `{entity}.{field}` holds a non-finite number")
            }
        }
    }
}

impl Error for ValidationError {}

/// Validates one record's fields against `entity` in `schema`.
pub fn validate_record(schema: &Schema, entity: &str, fields: &FieldMap) -> Result<(), ValidationError> {
    let descriptor = schema
        .entity(entity)
        .ok_or_else(|| ValidationError::UnknownEntity(entity.to_string()))?;

    for (name, value) in fields {
        let field = descriptor
            .field(name)
            .ok_or_else(|| ValidationError::UnknownField {
                entity: entity.to_string(),
                field: name.clone(),
            })?;
        if matches!(value, Value::Real(real) if !real.is_finite()) {
            return Err(ValidationError::NonFinite {
                entity: entity.to_string(),
                field: name.clone(),
            });
        }
        if !value.is_null() && !field.kind.accepts(value) {
            return Err(ValidationError::WrongKind {
                entity: entity.to_string(),
                field: name.clone(),
                expected: field.kind,
                found: value.kind_name(),
            });
        }
    }

    for field in descriptor.fields.iter().filter(|field| !field.optional) {
        let present = fields.get(&field.name).is_some_and(|value| !value.is_null());
        if !present {
            return Err(ValidationError::MissingRequired {
                entity: entity.to_string(),
                field: field.name.clone(),
            });
        }
    }

    Ok(())
}
