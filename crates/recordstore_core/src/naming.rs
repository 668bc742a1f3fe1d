//! Model name resolution.
//!
//! # Responsibility
//! - Turn loosely formatted candidate names into registered model names.
//! - Derive a default model name from the running program.
//!
//! # Invariants
//! - A resolved name always exists in the registry it was resolved against.
//! - Empty names never resolve.

use std::fmt::{Display, Formatter};

use crate::registry::ModelRegistry;

const SEPARATORS: [char; 4] = [' ', ',', '.', '-'];

/// Normalized, registered model name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelIdentity(String);

impl ModelIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for ModelIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn registered(name: String, registry: &dyn ModelRegistry) -> Option<ModelIdentity> {
    (!name.is_empty() && registry.exists(&name)).then_some(ModelIdentity(name))
}

/// Resolves `candidate` to a registered model name.
///
/// Separators (space, comma, period, hyphen) become underscores first. When
/// that name is unknown, every underscore is removed and the stripped name
/// is tried instead.
pub fn resolve_model_name(candidate: &str, registry: &dyn ModelRegistry) -> Option<ModelIdentity> {
    let substituted = candidate.replace(SEPARATORS, "_");
    let stripped = substituted.replace('_', "");
    if stripped == substituted {
        return registered(substituted, registry);
    }
    registered(substituted, registry).or_else(|| registered(stripped, registry))
}

/// Resolves the default model for the running program.
///
/// Candidates, first match wins: the registry's executable name, its display
/// name, then the current process name.
pub fn default_model_name(registry: &dyn ModelRegistry) -> Option<ModelIdentity> {
    registry
        .executable_name()
        .and_then(|name| resolve_model_name(&name, registry))
        .or_else(|| {
            registry
                .display_name()
                .and_then(|name| resolve_model_name(&name, registry))
        })
        .or_else(|| process_name().and_then(|name| resolve_model_name(&name, registry)))
}

fn process_name() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    exe.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
