//! Filter predicates and sort keys.
//!
//! # Responsibility
//! - Describe record filters as plain data that engines evaluate.
//! - Bind template variables before a filter is executed.
//!
//! # Invariants
//! - A predicate handed to an engine for execution should contain no
//!   unbound `Operand::Variable`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::model::record::RecordId;
use crate::model::value::{FieldMap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Template variable, written as `{"var": "<name>"}` in model files.
    Variable { var: String },
    Literal(Value),
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable { var: name.into() }
    }

    fn bind(&self, params: &FieldMap) -> Result<Operand, UnboundVariable> {
        match self {
            Self::Variable { var } => params
                .get(var)
                .cloned()
                .map(Self::Literal)
                .ok_or_else(|| UnboundVariable(var.clone())),
            Self::Literal(value) => Ok(Self::Literal(value.clone())),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// A template variable had no value in the substitution map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundVariable(pub String);

impl Display for UnboundVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unbound template variable `{}`", self.0)
    }
}

impl std::error::Error for UnboundVariable {}

/// Record filter. Missing fields evaluate as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    True,
    Compare {
        field: String,
        cmp: Comparison,
        value: Operand,
    },
    In {
        field: String,
        values: Vec<Operand>,
    },
    /// Substring match on text fields.
    Contains {
        field: String,
        value: Operand,
    },
    /// Regular expression match on text fields.
    Matches {
        field: String,
        pattern: String,
    },
    IsNull {
        field: String,
    },
    /// Matches the record with this identifier.
    Id {
        id: RecordId,
    },
    And {
        all: Vec<Predicate>,
    },
    Or {
        any: Vec<Predicate>,
    },
    Not {
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn compare(field: impl Into<String>, cmp: Comparison, value: Operand) -> Self {
        Self::Compare {
            field: field.into(),
            cmp,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, Operand::literal(value))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ne, Operand::literal(value))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lt, Operand::literal(value))
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Le, Operand::literal(value))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gt, Operand::literal(value))
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ge, Operand::literal(value))
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Operand::literal).collect(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains {
            field: field.into(),
            value: Operand::literal(value),
        }
    }

    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Matches {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    pub fn id(id: RecordId) -> Self {
        Self::Id { id }
    }

    pub fn and(all: Vec<Predicate>) -> Self {
        Self::And { all }
    }

    pub fn or(any: Vec<Predicate>) -> Self {
        Self::Or { any }
    }

    pub fn not(predicate: Predicate) -> Self {
        Self::Not {
            predicate: Box::new(predicate),
        }
    }

    /// Returns a copy with every variable replaced by its value in `params`.
    pub fn substitute(&self, params: &FieldMap) -> Result<Predicate, UnboundVariable> {
        let bound = match self {
            Self::True => Self::True,
            Self::Compare { field, cmp, value } => Self::Compare {
                field: field.clone(),
                cmp: *cmp,
                value: value.bind(params)?,
            },
            Self::In { field, values } => Self::In {
                field: field.clone(),
                values: values
                    .iter()
                    .map(|value| value.bind(params))
                    .collect::<Result<_, _>>()?,
            },
            Self::Contains { field, value } => Self::Contains {
                field: field.clone(),
                value: value.bind(params)?,
            },
            Self::Matches { .. } | Self::IsNull { .. } | Self::Id { .. } => self.clone(),
            Self::And { all } => Self::And {
                all: all
                    .iter()
                    .map(|predicate| predicate.substitute(params))
                    .collect::<Result<_, _>>()?,
            },
            Self::Or { any } => Self::Or {
                any: any
                    .iter()
                    .map(|predicate| predicate.substitute(params))
                    .collect::<Result<_, _>>()?,
            },
            Self::Not { predicate } => Self::Not {
                predicate: Box::new(predicate.substitute(params)?),
            },
        };
        Ok(bound)
    }
}

/// One ordering criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default = "ascending_by_default")]
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

fn ascending_by_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::{Comparison, Operand, Predicate, SortKey, UnboundVariable};
    use crate::model::value::{FieldMap, Value};

    #[test]
    fn model_file_syntax_parses() {
        let json = r#"{
            "op": "and",
            "all": [
                {"op": "compare", "field": "priority", "cmp": "ge", "value": {"var": "min"}},
                {"op": "not", "predicate": {"op": "is_null", "field": "title"}},
                {"op": "in", "field": "state", "values": ["open", 3, 1.5, null]}
            ]
        }"#;

        let parsed: Predicate = serde_json::from_str(json).expect("predicate should parse");
        assert_eq!(
            parsed,
            Predicate::and(vec![
                Predicate::compare("priority", Comparison::Ge, Operand::var("min")),
                Predicate::not(Predicate::is_null("title")),
                Predicate::In {
                    field: "state".into(),
                    values: vec![
                        Operand::literal("open"),
                        Operand::literal(3),
                        Operand::literal(1.5),
                        Operand::Literal(Value::Null),
                    ],
                },
            ])
        );
    }

    #[test]
    fn substitute_reports_first_unbound_variable() {
        let predicate = Predicate::or(vec![
            Predicate::compare("a", Comparison::Eq, Operand::var("x")),
            Predicate::compare("b", Comparison::Eq, Operand::var("y")),
        ]);

        let mut params = FieldMap::new();
        params.insert("x".into(), Value::Integer(1));
        assert_eq!(
            predicate.substitute(&params),
            Err(UnboundVariable("y".into()))
        );

        params.insert("y".into(), Value::Bool(true));
        let bound = predicate.substitute(&params).expect("all variables bound");
        assert_eq!(
            bound,
            Predicate::or(vec![Predicate::eq("a", 1), Predicate::eq("b", true)])
        );
    }

    #[test]
    fn sort_key_defaults_to_ascending() {
        let key: SortKey = serde_json::from_str(r#"{"field": "title"}"#).unwrap();
        assert_eq!(key, SortKey::ascending("title"));
    }
}
