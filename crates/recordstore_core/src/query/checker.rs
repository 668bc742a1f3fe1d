//! Request kind and result type checks.
//!
//! # Responsibility
//! - Reject non-fetch requests on fetch-only paths.
//! - Re-derive the result type of untyped (template) requests and compare
//!   it with the type the caller asked for.
//!
//! # Invariants
//! - A mismatching result type always fails; rows are never coerced.

use crate::error::{StoreError, StoreResult};
use crate::model::schema::Schema;
use crate::query::builder::check_backing_type;
use crate::query::request::{FetchRequest, RequestKind, ResultShape, TypedRequest};
use crate::query::result::FetchResult;

/// Fails with `RequestKindMismatch` unless `request.kind == expected`.
pub fn check_request_kind(request: &FetchRequest, expected: RequestKind) -> StoreResult<()> {
    if request.kind != expected {
        return Err(StoreError::RequestKindMismatch {
            requested: request.kind,
            expected,
        });
    }
    Ok(())
}

/// Checks that `request` yields values of type `R` under `schema`.
///
/// # Errors
/// - `ResultShapeUndetermined` when the request entity is unknown.
/// - `RequestedTypeMismatch` when shapes or backing types differ.
pub fn check_result_type<R: FetchResult>(request: &FetchRequest, schema: &Schema) -> StoreResult<()> {
    let entity = schema
        .entity(&request.entity)
        .ok_or(StoreError::ResultShapeUndetermined)?;

    if request.shape != R::SHAPE {
        let expected = match request.shape {
            ResultShape::Object => entity.backing_type.clone(),
            other => other.to_string(),
        };
        return Err(StoreError::RequestedTypeMismatch {
            requested: R::type_name(),
            expected,
        });
    }

    if request.shape == ResultShape::Object {
        check_backing_type::<R>(entity)?;
    }

    Ok(())
}

impl<R: FetchResult> TypedRequest<R> {
    /// Tags an untyped request with `R` after checking kind and result type.
    pub fn checked(request: FetchRequest, schema: &Schema) -> StoreResult<Self> {
        check_request_kind(&request, RequestKind::Fetch)?;
        check_result_type::<R>(&request, schema)?;
        Ok(Self::assume_checked(request))
    }
}

#[cfg(test)]
mod tests {
    use super::{check_request_kind, check_result_type};
    use crate::error::StoreError;
    use crate::model::record::RecordId;
    use crate::model::schema::{EntityDescriptor, Schema};
    use crate::query::request::{FetchRequest, RequestKind, ResultShape, TypedRequest};
    use crate::query::result::{Count, Projection};

    fn schema() -> Schema {
        Schema::new("Shop").with_entity(EntityDescriptor::new("Order", "OrderRecord"))
    }

    #[test]
    fn non_fetch_kinds_are_rejected() {
        let mut request = FetchRequest::new("Order", ResultShape::Count);
        request.kind = RequestKind::BatchDelete;

        let error = check_request_kind(&request, RequestKind::Fetch).unwrap_err();
        assert!(matches!(
            error,
            StoreError::RequestKindMismatch {
                requested: RequestKind::BatchDelete,
                expected: RequestKind::Fetch,
            }
        ));
        assert!(TypedRequest::<Count>::checked(request, &schema()).is_err());
    }

    #[test]
    fn shape_mismatch_names_both_types() {
        let request = FetchRequest::new("Order", ResultShape::Object);
        let error = check_result_type::<Projection>(&request, &schema()).unwrap_err();
        match error {
            StoreError::RequestedTypeMismatch {
                requested,
                expected,
            } => {
                assert_eq!(requested, "projection");
                assert_eq!(expected, "OrderRecord");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_entity_leaves_type_undetermined() {
        let request = FetchRequest::new("Ghost", ResultShape::Identifier);
        let error = check_result_type::<RecordId>(&request, &schema()).unwrap_err();
        assert!(matches!(error, StoreError::ResultShapeUndetermined));
    }

    #[test]
    fn matching_request_is_tagged() {
        let request = FetchRequest::new("Order", ResultShape::Identifier);
        let typed = TypedRequest::<RecordId>::checked(request.clone(), &schema()).unwrap();
        assert_eq!(typed.request(), &request);
    }
}
