//! Typed request construction.
//!
//! # Responsibility
//! - Turn an entity plus caller options into a `TypedRequest<R>`.
//! - Infer the result shape from `R` and keep only options that apply to it.
//!
//! # Invariants
//! - Object requests are only built when the entity's backing type is `R`.
//! - Identifier and count requests never load property values.

use crate::error::{StoreError, StoreResult};
use crate::model::schema::EntityDescriptor;
use crate::query::request::{FetchOptions, FetchRequest, ResultShape, TypedRequest};
use crate::query::result::FetchResult;

/// Builds a request for `entity` yielding `R`.
///
/// # Errors
/// - `ResultShapeUndetermined` when an object request targets an entity
///   without backing type.
/// - `RequestedTypeMismatch` when `R` is a record type other than the
///   entity's backing type.
pub fn build<R: FetchResult>(
    entity: &EntityDescriptor,
    options: FetchOptions,
) -> StoreResult<TypedRequest<R>> {
    if R::SHAPE == ResultShape::Object {
        check_backing_type::<R>(entity)?;
    }

    let mut request = FetchRequest::new(entity.name.clone(), R::SHAPE);
    if R::SHAPE == ResultShape::Projection {
        request.projection_fields = options.projection_fields;
        request.group_by = options.group_by;
        request.having = options.having;
    }

    request.filter = options.filter;
    request.order = options.order;
    request.distinct = options.distinct;
    request.returns_fault_placeholders = options.include_fault_placeholders;
    request.limit = options.limit;
    request.offset = options.offset;

    Ok(TypedRequest::assume_checked(request))
}

pub(crate) fn check_backing_type<R: FetchResult>(entity: &EntityDescriptor) -> StoreResult<()> {
    if entity.backing_type.trim().is_empty() {
        return Err(StoreError::ResultShapeUndetermined);
    }

    let requested = R::type_name();
    if requested != entity.backing_type {
        return Err(StoreError::RequestedTypeMismatch {
            requested,
            expected: entity.backing_type.clone(),
        });
    }

    Ok(())
}
