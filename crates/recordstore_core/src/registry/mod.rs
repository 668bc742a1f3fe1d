//! Model registries.
//!
//! # Responsibility
//! - Answer whether a named model exists and load its schema.
//! - Expose the program names used to pick a default model.
//!
//! # Invariants
//! - `load` succeeds only for names `exists` reports.
//! - Loaded schemas are validated before they are returned.

use crate::model::schema::{ModelError, Schema};

mod directory;
mod memory;

pub use directory::{DirectoryRegistry, MODEL_DIR_ENV, MODEL_FILE_SUFFIX};
pub use memory::InMemoryRegistry;

/// Source of named data models.
pub trait ModelRegistry: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    fn load(&self, name: &str) -> Result<Schema, ModelError>;

    /// Name of the executable the models ship with, if known.
    fn executable_name(&self) -> Option<String> {
        None
    }

    /// Human-readable program name, if known.
    fn display_name(&self) -> Option<String> {
        None
    }
}
