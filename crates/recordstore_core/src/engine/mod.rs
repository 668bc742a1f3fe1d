//! Storage engine contracts.
//!
//! # Responsibility
//! - Define the collaborator the record store delegates storage,
//!   transactional scopes and query execution to.
//! - Ship a SQLite reference engine implementing the contract.
//!
//! # Invariants
//! - Saving a scope with a parent moves its changes into the parent only;
//!   nothing reaches storage until a scope without parent is saved.
//! - Scopes are not synchronized against concurrent mutation: callers must
//!   serialize all mutations of one scope on a single execution context.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use crate::config::StoreConfig;
use crate::db::DbError;
use crate::model::record::RecordId;
use crate::model::schema::{ModelError, Schema};
use crate::model::value::FieldMap;
use crate::query::request::FetchRequest;
use crate::query::result::ResultRow;

pub mod eval;
mod pending;
pub mod sqlite;
pub mod validation;

pub use validation::ValidationError;

#[derive(Debug)]
pub enum EngineError {
    Db(DbError),
    Model(ModelError),
    Validation(ValidationError),
    Serialization(serde_json::Error),
    /// The store file was written for another model or layout.
    ModelMismatch { stored: String, requested: String },
    UnknownEntity(String),
    UnboundVariable(String),
    InvalidPattern { pattern: String, message: String },
    InvalidData(String),
    LockPoisoned(&'static str),
    /// An asynchronous fetch finished without producing a result.
    NoFinalResult,
    /// A count request returned no rows.
    EmptyCountResult,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Model(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
            Self::ModelMismatch { stored, requested } => write!(
                f,
                "store was created for model `{stored}` and cannot be opened as `{requested}`"
            ),
            Self::UnknownEntity(name) => write!(f, "unknown entity `{name}`"),
            Self::UnboundVariable(name) => write!(f, "unbound template variable `{name}`"),
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid match pattern `{pattern}`: {message}")
            }
            Self::InvalidData(message) => write!(f, "invalid stored record: {message}"),
            Self::LockPoisoned(operation) => write!(f, "lock poisoned during {operation}"),
            Self::NoFinalResult => write!(f, "asynchronous fetch produced no final result"),
            Self::EmptyCountResult => write!(f, "count request returned no result"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Model(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for EngineError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ModelError> for EngineError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<ValidationError> for EngineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// An opened storage engine bound to one schema.
pub trait StorageEngine: Send + Sync + Sized + 'static {
    type Scope: Scope;

    /// Opens (or creates) the persistent store for `schema`.
    fn open(schema: Arc<Schema>, config: &StoreConfig) -> EngineResult<Self>;

    /// Default scope owned by the engine, used when callers name none.
    fn view_scope(&self) -> Arc<Self::Scope>;

    /// Creates a scope. Without parent it saves straight to storage.
    fn new_scope(&self, parent: Option<&Arc<Self::Scope>>) -> Arc<Self::Scope>;
}

/// Unit of pending mutations, optionally chained to a parent scope.
pub trait Scope: Send + Sync + Sized {
    fn parent(&self) -> Option<Arc<Self>>;

    fn has_pending_changes(&self) -> EngineResult<bool>;

    /// Commits pending changes to the parent scope, or to storage when
    /// there is no parent.
    fn save(&self) -> EngineResult<()>;

    fn insert(&self, entity: &str, id: RecordId, fields: FieldMap) -> EngineResult<()>;

    fn update(&self, entity: &str, id: RecordId, fields: FieldMap) -> EngineResult<()>;

    fn delete(&self, entity: &str, id: RecordId) -> EngineResult<()>;

    /// Executes `request` against storage plus the pending changes visible
    /// from this scope.
    fn fetch(&self, request: &FetchRequest) -> EngineResult<Vec<ResultRow>>;

    /// Starts `request` in the background.
    fn fetch_async(&self, request: &FetchRequest) -> EngineResult<AsyncFetch>;
}

type FetchOutcome = EngineResult<Vec<ResultRow>>;

/// Handle to a fetch running on an engine-owned worker.
pub struct AsyncFetch {
    receiver: Receiver<FetchOutcome>,
}

impl AsyncFetch {
    /// Runs `job` on a new worker thread.
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> FetchOutcome + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let _ = sender.send(job());
        });
        Self { receiver }
    }

    /// Wraps a receiver fed by an engine's own executor.
    pub fn from_receiver(receiver: Receiver<FetchOutcome>) -> Self {
        Self { receiver }
    }

    /// Blocks until the fetch is finalized.
    ///
    /// Returns `None` when the worker went away without a result.
    pub fn wait(self) -> Option<FetchOutcome> {
        self.receiver.recv().ok()
    }
}
