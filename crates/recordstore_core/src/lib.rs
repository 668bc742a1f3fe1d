//! Typed record store over pluggable storage engines.
//! Models come from a registry; records, requests and results are typed.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod naming;
pub mod query;
pub mod registry;
pub mod store;

pub use config::{StoreConfig, StoreLocation};
pub use engine::sqlite::{SqliteEngine, SqliteScope};
pub use engine::{AsyncFetch, EngineError, EngineResult, Scope, StorageEngine};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{FieldError, Record, RecordId};
pub use model::schema::{
    EntityDescriptor, FieldDescriptor, FieldKind, ModelError, QueryTemplate, Schema,
};
pub use model::value::{FieldMap, Value};
pub use naming::{default_model_name, resolve_model_name, ModelIdentity};
pub use query::predicate::{Comparison, Operand, Predicate, SortKey};
pub use query::request::{
    EntitySelector, FetchOptions, FetchRequest, RequestKind, ResultShape, TypedRequest,
};
pub use query::result::{Count, FetchResult, Projection, ResultRow};
pub use registry::{DirectoryRegistry, InMemoryRegistry, ModelRegistry};
pub use store::{initialize_shared, reset_shared_for_tests, shared, RecordStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
