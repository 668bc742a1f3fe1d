//! Query descriptors.
//!
//! # Responsibility
//! - Define the untyped request engines execute (`FetchRequest`).
//! - Tag requests with the result type callers expect (`TypedRequest<R>`).
//!
//! # Invariants
//! - `TypedRequest<R>` is only produced after its shape was checked
//!   against `R` (builder or checker).

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

use crate::model::record::Record;
use crate::model::schema::EntityDescriptor;
use crate::query::predicate::{Predicate, SortKey};

/// Kind of request handed to an engine.
///
/// Only `Fetch` requests are accepted by fetch/execute paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    #[default]
    Fetch,
    BatchUpdate,
    BatchDelete,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::BatchUpdate => "batch_update",
            Self::BatchDelete => "batch_delete",
        }
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of value a fetch yields per result row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Full records decoded into the entity's backing type.
    #[default]
    Object,
    /// Record identifiers only.
    Identifier,
    /// Field name to value maps.
    Projection,
    /// A single row holding the number of matches.
    Count,
}

impl ResultShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Identifier => "identifier",
            Self::Projection => "projection",
            Self::Count => "count",
        }
    }
}

impl Display for ResultShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped query descriptor executed by storage engines.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub kind: RequestKind,
    pub entity: String,
    pub shape: ResultShape,
    pub filter: Option<Predicate>,
    pub order: Option<Vec<SortKey>>,
    /// Projection shape only.
    pub projection_fields: Option<Vec<String>>,
    /// Projection shape only.
    pub group_by: Option<Vec<String>>,
    /// Projection shape only; evaluated against grouped rows.
    pub having: Option<Predicate>,
    pub distinct: bool,
    /// `false` for identifier and count requests.
    pub include_property_values: bool,
    /// Engines without lazy loading may ignore this flag.
    pub returns_fault_placeholders: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl FetchRequest {
    pub fn new(entity: impl Into<String>, shape: ResultShape) -> Self {
        Self {
            kind: RequestKind::Fetch,
            entity: entity.into(),
            shape,
            filter: None,
            order: None,
            projection_fields: None,
            group_by: None,
            having: None,
            distinct: false,
            include_property_values: !matches!(
                shape,
                ResultShape::Identifier | ResultShape::Count
            ),
            returns_fault_placeholders: true,
            limit: None,
            offset: 0,
        }
    }
}

/// Caller-facing request options.
///
/// Fields that do not apply to the requested result shape are dropped by
/// the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub include_fault_placeholders: bool,
    pub filter: Option<Predicate>,
    pub order: Option<Vec<SortKey>>,
    pub projection_fields: Option<Vec<String>>,
    pub distinct: bool,
    pub group_by: Option<Vec<String>>,
    pub having: Option<Predicate>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_fault_placeholders: true,
            filter: None,
            order: None,
            projection_fields: None,
            distinct: false,
            group_by: None,
            having: None,
            limit: None,
            offset: 0,
        }
    }
}

impl FetchOptions {
    pub fn filtered(filter: Predicate) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order(mut self, order: Vec<SortKey>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.projection_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_group_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.group_by = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_having(mut self, having: Predicate) -> Self {
        self.having = Some(having);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn as_faults(mut self, include_fault_placeholders: bool) -> Self {
        self.include_fault_placeholders = include_fault_placeholders;
        self
    }
}

/// How a request names its entity.
#[derive(Debug, Clone, Copy)]
pub enum EntitySelector<'a> {
    Descriptor(&'a EntityDescriptor),
    Name(&'a str),
    /// Entity of a `Record` type, see [`EntitySelector::of`].
    Type(&'static str),
}

impl EntitySelector<'static> {
    pub fn of<T: Record>() -> Self {
        Self::Type(T::ENTITY)
    }
}

impl<'a> From<&'a str> for EntitySelector<'a> {
    fn from(value: &'a str) -> Self {
        Self::Name(value)
    }
}

impl<'a> From<&'a EntityDescriptor> for EntitySelector<'a> {
    fn from(value: &'a EntityDescriptor) -> Self {
        Self::Descriptor(value)
    }
}

/// A request whose result shape matches `R`.
pub struct TypedRequest<R> {
    request: FetchRequest,
    _result: PhantomData<fn() -> R>,
}

impl<R> TypedRequest<R> {
    pub(crate) fn assume_checked(request: FetchRequest) -> Self {
        Self {
            request,
            _result: PhantomData,
        }
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn into_request(self) -> FetchRequest {
        self.request
    }
}

impl<R> Clone for TypedRequest<R> {
    fn clone(&self) -> Self {
        Self::assume_checked(self.request.clone())
    }
}

impl<R> Debug for TypedRequest<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRequest")
            .field("result", &std::any::type_name::<R>())
            .field("request", &self.request)
            .finish()
    }
}
