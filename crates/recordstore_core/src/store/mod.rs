//! Record store facade.
//!
//! # Responsibility
//! - Bind one resolved model to an opened storage engine.
//! - Build and check typed requests, then delegate execution to scopes.
//! - Create, update and delete records in change scopes and save them.
//!
//! # Invariants
//! - A `RecordStore` value only exists for a fully opened store.
//! - Results are decoded into the requested type or the call fails.
//! - `save_changes` visits every ancestor scope in parent order and stops
//!   at the first failure.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Instant;

use crate::config::StoreConfig;
use crate::engine::sqlite::SqliteEngine;
use crate::engine::{EngineError, Scope, StorageEngine};
use crate::error::{StoreError, StoreResult};
use crate::model::record::{Record, RecordId};
use crate::model::schema::{EntityDescriptor, Schema};
use crate::model::value::FieldMap;
use crate::naming::{resolve_model_name, ModelIdentity};
use crate::query::builder::{self, check_backing_type};
use crate::query::checker::{check_request_kind, check_result_type};
use crate::query::predicate::Predicate;
use crate::query::request::{
    EntitySelector, FetchOptions, FetchRequest, RequestKind, TypedRequest,
};
use crate::query::result::{Count, FetchResult, Projection};
use crate::registry::ModelRegistry;

mod shared;

pub use shared::{initialize_shared, reset_shared_for_tests, shared};

/// Opened store for one model.
pub struct RecordStore<E: StorageEngine = SqliteEngine> {
    model: ModelIdentity,
    schema: Arc<Schema>,
    engine: E,
}

impl<E: StorageEngine> RecordStore<E> {
    /// Resolves `model_name` in `registry` and opens its store.
    ///
    /// # Errors
    /// - `ModelNotFound` when the name does not resolve.
    /// - `StoreLoad` when the schema or the store file cannot be loaded.
    pub fn open(
        model_name: &str,
        registry: &dyn ModelRegistry,
        config: &StoreConfig,
    ) -> StoreResult<Self> {
        let model = resolve_model_name(model_name, registry).ok_or_else(|| {
            error!("event=store_open module=store status=error model={model_name} error_code=model_not_found");
            StoreError::ModelNotFound(model_name.to_string())
        })?;
        Self::open_resolved(model, registry, config)
    }

    /// Opens the store of an already resolved model.
    pub fn open_resolved(
        model: ModelIdentity,
        registry: &dyn ModelRegistry,
        config: &StoreConfig,
    ) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!("event=store_open module=store status=start model={model}");

        let opened = registry
            .load(model.as_str())
            .map_err(EngineError::from)
            .map(Arc::new)
            .and_then(|schema| {
                E::open(Arc::clone(&schema), config).map(|engine| (schema, engine))
            });

        match opened {
            Ok((schema, engine)) => {
                info!(
                    "event=store_open module=store status=ok model={model} entities={} duration_ms={}",
                    schema.entities.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    model,
                    schema,
                    engine,
                })
            }
            Err(err) => {
                error!(
                    "event=store_open module=store status=error model={model} duration_ms={} error_code=store_load_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(StoreError::StoreLoad(err))
            }
        }
    }

    pub fn model(&self) -> &ModelIdentity {
        &self.model
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Looks up an entity of the model.
    pub fn entity(&self, name: &str) -> StoreResult<&EntityDescriptor> {
        self.schema
            .entity(name)
            .ok_or_else(|| StoreError::EntityNotFound(name.to_string()))
    }

    fn resolve<'a>(&'a self, selector: EntitySelector<'a>) -> StoreResult<&'a EntityDescriptor> {
        match selector {
            EntitySelector::Descriptor(entity) => Ok(entity),
            EntitySelector::Name(name) => self.entity(name),
            EntitySelector::Type(name) => self.entity(name),
        }
    }

    /// Builds a typed request for the selected entity.
    pub fn request<'a, R: FetchResult>(
        &'a self,
        selector: impl Into<EntitySelector<'a>>,
        options: FetchOptions,
    ) -> StoreResult<TypedRequest<R>> {
        let entity = self.resolve(selector.into())?;
        builder::build::<R>(entity, options)
    }

    /// Expands a model query template and checks it yields `R`.
    ///
    /// An empty substitution map expands the template as is.
    ///
    /// # Errors
    /// - `TemplateNotFound` when the template is missing or one of its
    ///   variables has no substitution.
    pub fn request_from_template<R: FetchResult>(
        &self,
        name: &str,
        substitutions: Option<&FieldMap>,
    ) -> StoreResult<TypedRequest<R>> {
        let request = match substitutions {
            Some(params) if !params.is_empty() => self.schema.query_template_with(name, params),
            _ => self.schema.query_template(name),
        }
        .ok_or_else(|| StoreError::TemplateNotFound(name.to_string()))?;
        TypedRequest::checked(request, &self.schema)
    }

    /// Default scope of the engine.
    pub fn view_scope(&self) -> Arc<E::Scope> {
        self.engine.view_scope()
    }

    /// Creates a scope, nested under `parent` when given.
    pub fn new_scope(&self, parent: Option<&Arc<E::Scope>>) -> Arc<E::Scope> {
        self.engine.new_scope(parent)
    }

    fn record_entity<T: Record>(&self) -> StoreResult<&EntityDescriptor> {
        let entity = self.entity(T::ENTITY)?;
        check_backing_type::<T>(entity)?;
        Ok(entity)
    }

    /// Creates an unsaved record in the view scope.
    pub fn new_record<T: Record>(&self, initial: &FieldMap) -> StoreResult<T> {
        self.new_record_in(&self.view_scope(), initial)
    }

    /// Creates an unsaved record with a fresh id in `scope`.
    ///
    /// Every entry of `initial` goes through the record's field setter.
    pub fn new_record_in<T: Record>(&self, scope: &E::Scope, initial: &FieldMap) -> StoreResult<T> {
        self.record_entity::<T>()?;
        let mut record = T::blank(RecordId::new());
        record.apply_fields(initial)?;
        scope
            .insert(T::ENTITY, record.id(), record.to_fields())
            .map_err(StoreError::Scope)?;
        debug!(
            "event=record_new module=store status=ok entity={} id={}",
            T::ENTITY,
            record.id()
        );
        Ok(record)
    }

    /// Registers the current fields of `record` as a pending change.
    pub fn update_record<T: Record>(&self, record: &T) -> StoreResult<()> {
        self.update_record_in(&self.view_scope(), record)
    }

    pub fn update_record_in<T: Record>(&self, scope: &E::Scope, record: &T) -> StoreResult<()> {
        self.record_entity::<T>()?;
        scope
            .update(T::ENTITY, record.id(), record.to_fields())
            .map_err(StoreError::Scope)
    }

    /// Marks `record` for removal on the next save.
    pub fn delete_record<T: Record>(&self, record: &T) -> StoreResult<()> {
        self.delete_record_in(&self.view_scope(), record)
    }

    pub fn delete_record_in<T: Record>(&self, scope: &E::Scope, record: &T) -> StoreResult<()> {
        self.record_entity::<T>()?;
        scope
            .delete(T::ENTITY, record.id())
            .map_err(StoreError::Scope)
    }

    /// Saves `scope` (the view scope when `None`) and then every ancestor.
    ///
    /// Scopes without pending changes are skipped but still walked through.
    pub fn save_changes(&self, scope: Option<&Arc<E::Scope>>) -> StoreResult<()> {
        let started_at = Instant::now();
        let mut current = Some(scope.cloned().unwrap_or_else(|| self.view_scope()));
        let mut visited = 0usize;
        let mut saved = 0usize;

        while let Some(scope) = current {
            let result = scope.has_pending_changes().and_then(|pending| {
                if pending {
                    saved += 1;
                    scope.save()
                } else {
                    Ok(())
                }
            });
            if let Err(err) = result {
                error!(
                    "event=save_changes module=store status=error depth={visited} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(StoreError::Save(err));
            }
            visited += 1;
            current = scope.parent();
        }

        info!(
            "event=save_changes module=store status=ok scopes={visited} saved={saved} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn checked_request<'r, R: FetchResult>(
        &self,
        request: &'r TypedRequest<R>,
    ) -> StoreResult<&'r FetchRequest> {
        let request = request.request();
        check_request_kind(request, RequestKind::Fetch)?;
        check_result_type::<R>(request, &self.schema)?;
        Ok(request)
    }

    /// Fetches in the view scope.
    pub fn fetch<R: FetchResult>(&self, request: &TypedRequest<R>) -> StoreResult<Vec<R>> {
        self.fetch_in(&self.view_scope(), request)
    }

    pub fn fetch_in<R: FetchResult>(
        &self,
        scope: &E::Scope,
        request: &TypedRequest<R>,
    ) -> StoreResult<Vec<R>> {
        let request = self.checked_request(request)?;
        let rows = scope.fetch(request).map_err(|err| {
            error!(
                "event=fetch module=store status=error entity={} shape={} error={}",
                request.entity, request.shape, err
            );
            StoreError::Fetch(err)
        })?;
        debug!(
            "event=fetch module=store status=ok entity={} shape={} rows={}",
            request.entity,
            request.shape,
            rows.len()
        );
        rows.into_iter().map(R::from_row).collect()
    }

    /// Runs the request on the engine's worker and waits for it, in the
    /// view scope.
    pub fn execute<R: FetchResult>(&self, request: &TypedRequest<R>) -> StoreResult<Vec<R>> {
        self.execute_in(&self.view_scope(), request)
    }

    pub fn execute_in<R: FetchResult>(
        &self,
        scope: &E::Scope,
        request: &TypedRequest<R>,
    ) -> StoreResult<Vec<R>> {
        let request = self.checked_request(request)?;
        let outcome = scope
            .fetch_async(request)
            .map_err(StoreError::Fetch)?
            .wait()
            .unwrap_or(Err(EngineError::NoFinalResult));
        let rows = outcome.map_err(|err| {
            error!(
                "event=execute module=store status=error entity={} shape={} error={}",
                request.entity, request.shape, err
            );
            StoreError::Fetch(err)
        })?;
        debug!(
            "event=execute module=store status=ok entity={} shape={} rows={}",
            request.entity,
            request.shape,
            rows.len()
        );
        rows.into_iter().map(R::from_row).collect()
    }

    /// Counts records of the selected entity matching `filter`.
    ///
    /// With `distinct`, records with equal field values count once.
    pub fn count<'a>(
        &'a self,
        selector: impl Into<EntitySelector<'a>>,
        filter: Option<Predicate>,
        distinct: bool,
    ) -> StoreResult<u64> {
        let mut options = FetchOptions {
            filter,
            ..FetchOptions::default()
        };
        if distinct {
            options = options.distinct();
        }
        let request = self.request::<Count>(selector, options)?;
        let count = self
            .fetch(&request)?
            .first()
            .map(Count::value)
            .ok_or(StoreError::Fetch(EngineError::EmptyCountResult))?;
        debug!(
            "event=count module=store status=ok entity={} count={count}",
            request.request().entity
        );
        Ok(count)
    }

    /// Fetches records of type `T` from the view scope.
    pub fn fetch_records<T: Record>(&self, options: FetchOptions) -> StoreResult<Vec<T>> {
        let request = self.request::<T>(EntitySelector::of::<T>(), options)?;
        self.fetch(&request)
    }

    /// Fetches record identifiers of the selected entity.
    pub fn fetch_ids<'a>(
        &'a self,
        selector: impl Into<EntitySelector<'a>>,
        options: FetchOptions,
    ) -> StoreResult<Vec<RecordId>> {
        let request = self.request::<RecordId>(selector, options)?;
        self.fetch(&request)
    }

    /// Fetches field projections of the selected entity.
    pub fn fetch_projections<'a>(
        &'a self,
        selector: impl Into<EntitySelector<'a>>,
        options: FetchOptions,
    ) -> StoreResult<Vec<Projection>> {
        let request = self.request::<Projection>(selector, options)?;
        self.fetch(&request)
    }
}
