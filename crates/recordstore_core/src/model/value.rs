//! Field values stored on records.
//!
//! # Responsibility
//! - Define the dynamically-typed value carried by every record field.
//! - Provide one total ordering used by sorting, grouping and comparisons.
//!
//! # Invariants
//! - Ordering ranks kinds as `Null < Bool < numbers < Text`.
//! - `Integer` and `Real` compare numerically against each other.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::model::record::FieldError;

/// Field name to value mapping for one record or projection row.
pub type FieldMap = BTreeMap<String, Value>;

/// One field value. Serialized as the matching JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Stable lowercase name of this value's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the numeric value, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns whether both values belong to the same ordering rank.
    pub fn is_comparable_with(&self, other: &Value) -> bool {
        self.rank() == other.rank()
    }

    /// Total ordering across all kinds.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Bool(left), Self::Bool(right)) => left.cmp(right),
            (Self::Integer(left), Self::Integer(right)) => left.cmp(right),
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
            (left, right) if left.rank() == 2 && right.rank() == 2 => {
                let left = left.as_f64().unwrap_or_default();
                let right = right.as_f64().unwrap_or_default();
                left.total_cmp(&right)
            }
            (left, right) => left.rank().cmp(&right.rank()),
        }
    }

    /// Consumes the value as text, reporting `field` on mismatch.
    pub fn into_text(self, field: &str) -> Result<String, FieldError> {
        match self {
            Self::Text(value) => Ok(value),
            other => Err(FieldError::mismatch(field, "text", &other)),
        }
    }

    /// Consumes the value as optional text; `Null` maps to `None`.
    pub fn into_optional_text(self, field: &str) -> Result<Option<String>, FieldError> {
        match self {
            Self::Null => Ok(None),
            other => other.into_text(field).map(Some),
        }
    }

    pub fn into_i64(self, field: &str) -> Result<i64, FieldError> {
        match self {
            Self::Integer(value) => Ok(value),
            other => Err(FieldError::mismatch(field, "integer", &other)),
        }
    }

    pub fn into_f64(self, field: &str) -> Result<f64, FieldError> {
        match self.as_f64() {
            Some(value) => Ok(value),
            None => Err(FieldError::mismatch(field, "real", &self)),
        }
    }

    pub fn into_bool(self, field: &str) -> Result<bool, FieldError> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(FieldError::mismatch(field, "bool", &other)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) | Self::Real(_) => 2,
            Self::Text(_) => 3,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldMap, Value};
    use std::cmp::Ordering;

    #[test]
    fn ordering_ranks_kinds_then_values() {
        assert_eq!(Value::Null.total_cmp(&Value::Bool(false)), Ordering::Less);
        assert_eq!(
            Value::Integer(10).total_cmp(&Value::Text("a".into())),
            Ordering::Less
        );
        assert_eq!(
            Value::Integer(2).total_cmp(&Value::Real(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            Value::Real(3.0).total_cmp(&Value::Integer(3)),
            Ordering::Equal
        );
    }

    #[test]
    fn json_uses_native_scalars() {
        let mut fields = FieldMap::new();
        fields.insert("done".into(), Value::Bool(true));
        fields.insert("note".into(), Value::Null);
        fields.insert("rank".into(), Value::Integer(3));
        fields.insert("score".into(), Value::Real(0.5));
        fields.insert("title".into(), "milk".into());

        let json = serde_json::to_string(&fields).expect("fields should serialize");
        assert_eq!(
            json,
            r#"{"done":true,"note":null,"rank":3,"score":0.5,"title":"milk"}"#
        );

        let parsed: FieldMap = serde_json::from_str(&json).expect("fields should parse");
        assert_eq!(parsed, fields);
    }

    #[test]
    fn typed_extractors_report_field_on_mismatch() {
        let error = Value::Integer(1)
            .into_text("title")
            .expect_err("integer is not text");
        assert_eq!(error.to_string(), "field `title` expects text, got integer");
        assert_eq!(Value::Null.into_optional_text("title").unwrap(), None);
        assert_eq!(Value::Integer(4).into_f64("score").unwrap(), 4.0);
    }
}
