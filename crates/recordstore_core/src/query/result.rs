//! Result rows and the types they decode into.

use std::collections::btree_map;
use std::ops::Deref;

use crate::error::{StoreError, StoreResult};
use crate::model::record::{Record, RecordId};
use crate::model::value::{FieldMap, Value};
use crate::query::request::ResultShape;

/// One row produced by an engine for a fetch request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    Object { id: RecordId, fields: FieldMap },
    Identifier(RecordId),
    Projection(FieldMap),
    Count(u64),
}

impl ResultRow {
    pub fn shape(&self) -> ResultShape {
        match self {
            Self::Object { .. } => ResultShape::Object,
            Self::Identifier(_) => ResultShape::Identifier,
            Self::Projection(_) => ResultShape::Projection,
            Self::Count(_) => ResultShape::Count,
        }
    }
}

/// A type fetch results can be decoded into.
///
/// Implemented for every [`Record`] plus [`RecordId`], [`Projection`] and
/// [`Count`].
pub trait FetchResult: Sized {
    const SHAPE: ResultShape;

    /// Name compared against the type a request yields.
    fn type_name() -> String;

    fn from_row(row: ResultRow) -> StoreResult<Self>;
}

fn unexpected_row<R: FetchResult>(row: &ResultRow) -> StoreError {
    StoreError::RequestedTypeMismatch {
        requested: R::type_name(),
        expected: row.shape().to_string(),
    }
}

impl<T: Record> FetchResult for T {
    const SHAPE: ResultShape = ResultShape::Object;

    fn type_name() -> String {
        T::TYPE_NAME.to_string()
    }

    fn from_row(row: ResultRow) -> StoreResult<Self> {
        match row {
            ResultRow::Object { id, fields } => {
                let mut record = T::blank(id);
                record.apply_fields(&fields)?;
                Ok(record)
            }
            other => Err(unexpected_row::<T>(&other)),
        }
    }
}

impl FetchResult for RecordId {
    const SHAPE: ResultShape = ResultShape::Identifier;

    fn type_name() -> String {
        ResultShape::Identifier.to_string()
    }

    fn from_row(row: ResultRow) -> StoreResult<Self> {
        match row {
            ResultRow::Identifier(id) => Ok(id),
            other => Err(unexpected_row::<Self>(&other)),
        }
    }
}

/// Field name to value map returned by projection requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection(FieldMap);

impl Projection {
    pub fn new(fields: FieldMap) -> Self {
        Self(fields)
    }

    pub fn into_fields(self) -> FieldMap {
        self.0
    }
}

impl Deref for Projection {
    type Target = FieldMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Projection {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FetchResult for Projection {
    const SHAPE: ResultShape = ResultShape::Projection;

    fn type_name() -> String {
        ResultShape::Projection.to_string()
    }

    fn from_row(row: ResultRow) -> StoreResult<Self> {
        match row {
            ResultRow::Projection(fields) => Ok(Self(fields)),
            other => Err(unexpected_row::<Self>(&other)),
        }
    }
}

/// Number of records matched by a count request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Count(pub u64);

impl Count {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl FetchResult for Count {
    const SHAPE: ResultShape = ResultShape::Count;

    fn type_name() -> String {
        ResultShape::Count.to_string()
    }

    fn from_row(row: ResultRow) -> StoreResult<Self> {
        match row {
            ResultRow::Count(count) => Ok(Self(count)),
            other => Err(unexpected_row::<Self>(&other)),
        }
    }
}
