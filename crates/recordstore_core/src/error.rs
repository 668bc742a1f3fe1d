//! Facade error taxonomy.
//!
//! # Responsibility
//! - Surface every failure of the record store as one typed error.
//!
//! # Invariants
//! - Engine failures keep their cause as `source()`.
//! - Only `StoreLoad` is terminal for a handle; all others are recoverable.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::engine::EngineError;
use crate::model::record::FieldError;
use crate::query::request::RequestKind;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// The registry has no model with this name.
    ModelNotFound(String),
    /// No explicit model name was given and no default resolved.
    DefaultModelUndetermined,
    /// The schema or the persistent store could not be loaded.
    StoreLoad(EngineError),
    /// The shared store was already initialized.
    AlreadyInitialized,
    Save(EngineError),
    Fetch(EngineError),
    /// Recording a pending insert, update or delete in a scope failed.
    Scope(EngineError),
    TemplateNotFound(String),
    EntityNotFound(String),
    /// The result type of a request cannot be derived from its entity.
    ResultShapeUndetermined,
    RequestKindMismatch {
        requested: RequestKind,
        expected: RequestKind,
    },
    RequestedTypeMismatch {
        requested: String,
        expected: String,
    },
    /// A record setter rejected a field.
    Field(FieldError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelNotFound(name) => write!(f, "model `{name}` does not exist"),
            Self::DefaultModelUndetermined => write!(f, "failed to determine default model"),
            Self::StoreLoad(err) => write!(f, "failed to load store: {err}"),
            Self::AlreadyInitialized => write!(f, "shared store is already initialized"),
            Self::Save(err) => write!(f, "failed to save changes: {err}"),
            Self::Fetch(err) => write!(f, "failed to fetch: {err}"),
            Self::Scope(err) => write!(f, "failed to record change: {err}"),
            Self::TemplateNotFound(name) => write!(f, "failed to load query template `{name}`"),
            Self::EntityNotFound(name) => write!(f, "entity `{name}` not found"),
            Self::ResultShapeUndetermined => write!(f, "request result type cannot be determined"),
            Self::RequestKindMismatch {
                requested,
                expected,
            } => write!(f, "request kind `{requested}` given where `{expected}` is required"),
            Self::RequestedTypeMismatch {
                requested,
                expected,
            } => write!(f, "requested result type `{requested}` but request yields `{expected}`"),
            Self::Field(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreLoad(err) | Self::Save(err) | Self::Fetch(err) | Self::Scope(err) => {
                Some(err)
            }
            Self::Field(err) => Some(err),
            Self::ModelNotFound(_)
            | Self::DefaultModelUndetermined
            | Self::AlreadyInitialized
            | Self::TemplateNotFound(_)
            | Self::EntityNotFound(_)
            | Self::ResultShapeUndetermined
            | Self::RequestKindMismatch { .. }
            | Self::RequestedTypeMismatch { .. } => None,
        }
    }
}

impl From<FieldError> for StoreError {
    fn from(value: FieldError) -> Self {
        Self::Field(value)
    }
}
