//! Declared data model: entities, fields and named query templates.
//!
//! # Responsibility
//! - Describe the entities a store can hold and the backing type of each.
//! - Hold predefined query templates and expand them into fetch requests.
//! - Validate a loaded model before any store is opened with it.
//!
//! # Invariants
//! - Entity names are non-empty and unique within one schema.
//! - Every entity declares a non-empty backing type name.
//! - Templates reference entities declared in the same schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::model::value::{FieldMap, Value};
use crate::query::predicate::{Predicate, SortKey};
use crate::query::request::{FetchRequest, RequestKind, ResultShape};

/// Errors raised while loading or validating a schema.
#[derive(Debug)]
pub enum ModelError {
    /// No model resource exists under this name.
    NotFound(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        name: String,
        source: serde_json::Error,
    },
    /// The model parsed but breaks a schema invariant.
    Invalid(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "model `{name}` not found"),
            Self::Io { path, source } => {
                write!(f, "failed to read model file `{}`: {source}", path.display())
            }
            Self::Parse { name, source } => write!(f, "failed to parse model `{name}`: {source}"),
            Self::Invalid(message) => write!(f, "invalid model: {message}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Storage kind of one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Integer,
    Real,
    Text,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
        }
    }

    /// Returns whether a non-null `value` can be stored in this kind.
    ///
    /// `Real` fields also accept integers.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Bool, Value::Bool(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Real, Value::Integer(_) | Value::Real(_))
                | (Self::Text, Value::Text(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Optional fields may be absent or `null`.
    #[serde(default)]
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

/// One named record type of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    /// Name of the application type that represents this entity.
    pub backing_type: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, backing_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backing_type: backing_type.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Predefined query stored in the schema.
///
/// Filter operands may reference `{"var": "<name>"}` variables that are
/// bound through [`Schema::query_template_with`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub name: String,
    pub entity: String,
    #[serde(default)]
    pub kind: RequestKind,
    #[serde(default)]
    pub shape: ResultShape,
    #[serde(default)]
    pub filter: Option<Predicate>,
    #[serde(default)]
    pub order: Option<Vec<SortKey>>,
    #[serde(default)]
    pub projection_fields: Option<Vec<String>>,
    #[serde(default)]
    pub distinct: bool,
}

impl QueryTemplate {
    fn to_request(&self) -> FetchRequest {
        let mut request = FetchRequest::new(self.entity.clone(), self.shape);
        request.kind = self.kind;
        request.filter = self.filter.clone();
        request.order = self.order.clone();
        request.distinct = self.distinct;
        if self.shape == ResultShape::Projection {
            request.projection_fields = self.projection_fields.clone();
        }
        request
    }
}

/// Complete data model of one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: u32,
    pub entities: Vec<EntityDescriptor>,
    #[serde(default)]
    pub templates: Vec<QueryTemplate>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            entities: Vec::new(),
            templates: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_template(mut self, template: QueryTemplate) -> Self {
        self.templates.push(template);
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        if name.is_empty() {
            return None;
        }
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Expands the named template without variable substitution.
    pub fn query_template(&self, name: &str) -> Option<FetchRequest> {
        self.templates
            .iter()
            .find(|template| template.name == name)
            .map(QueryTemplate::to_request)
    }

    /// Expands the named template and binds its filter variables.
    ///
    /// Empty `params` leave the filter untouched. Otherwise returns `None`
    /// when the template is missing or a variable it uses has no entry in
    /// `params`.
    pub fn query_template_with(&self, name: &str, params: &FieldMap) -> Option<FetchRequest> {
        let mut request = self.query_template(name)?;
        if params.is_empty() {
            return Some(request);
        }
        if let Some(filter) = request.filter.take() {
            request.filter = Some(filter.substitute(params).ok()?);
        }
        Some(request)
    }

    /// Checks structural invariants of the model.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut entity_names = BTreeSet::new();
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(ModelError::Invalid("entity name cannot be empty".into()));
            }
            if !entity_names.insert(entity.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate entity `{}`",
                    entity.name
                )));
            }
            if entity.backing_type.trim().is_empty() {
                return Err(ModelError::Invalid(format!(
                    "entity `{}` declares no backing type",
                    entity.name
                )));
            }

            let mut field_names = BTreeSet::new();
            for field in &entity.fields {
                if field.name.trim().is_empty() {
                    return Err(ModelError::Invalid(format!(
                        "entity `{}` has a field without name",
                        entity.name
                    )));
                }
                if !field_names.insert(field.name.as_str()) {
                    return Err(ModelError::Invalid(format!(
                        "duplicate field `{}` in entity `{}`",
                        field.name, entity.name
                    )));
                }
            }
        }

        let mut template_names = BTreeSet::new();
        for template in &self.templates {
            if !template_names.insert(template.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate query template `{}`",
                    template.name
                )));
            }
            if !entity_names.contains(template.entity.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "query template `{}` references unknown entity `{}`",
                    template.name, template.entity
                )));
            }
        }

        Ok(())
    }

    /// Canonical JSON of the entity layout.
    ///
    /// Two schemas with equal signatures can read each other's stores.
    pub fn layout_signature(&self) -> Result<String, ModelError> {
        serde_json::to_string(&self.entities).map_err(|source| ModelError::Parse {
            name: self.name.clone(),
            source,
        })
    }
}
