use std::collections::BTreeMap;

use crate::model::schema::{ModelError, Schema};
use crate::registry::ModelRegistry;

/// Registry holding schemas in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    models: BTreeMap<String, Schema>,
    executable_name: Option<String>,
    display_name: Option<String>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `schema` under its own name, replacing any previous model.
    pub fn register(mut self, schema: Schema) -> Self {
        self.models.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = Some(name.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

impl ModelRegistry for InMemoryRegistry {
    fn exists(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    fn load(&self, name: &str) -> Result<Schema, ModelError> {
        let schema = self
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(name.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    fn executable_name(&self) -> Option<String> {
        self.executable_name.clone()
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRegistry;
    use crate::model::schema::{EntityDescriptor, ModelError, Schema};
    use crate::registry::ModelRegistry;

    #[test]
    fn loads_registered_models_and_validates_them() {
        let registry = InMemoryRegistry::new()
            .register(Schema::new("Todo").with_entity(EntityDescriptor::new("Task", "TaskRecord")))
            .register(Schema::new("Broken").with_entity(EntityDescriptor::new("Task", "")));

        assert!(registry.exists("Todo"));
        assert_eq!(registry.load("Todo").unwrap().name, "Todo");
        assert!(matches!(registry.load("Broken"), Err(ModelError::Invalid(_))));
        assert!(matches!(registry.load("Ghost"), Err(ModelError::NotFound(_))));
    }
}
