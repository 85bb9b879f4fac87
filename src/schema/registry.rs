use std::collections::HashMap;

use super::definition::SchemaDefinition;
use super::error::SchemaError;

/// Name-to-schema mapping, populated once at startup before the handler
/// table is built and read-only afterwards. Holds no derived artifacts;
/// record definitions and services live with the engine.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    // Registration order matters for `all()`, so schemas live in the Vec
    // and the map only indexes into it.
    schemas: Vec<SchemaDefinition>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: SchemaDefinition) -> Result<(), SchemaError> {
        if self.by_name.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateSchema(schema.name));
        }
        tracing::info!(schema = %schema.name, fields = schema.fields.len(), "registering schema");
        self.by_name.insert(schema.name.clone(), self.schemas.len());
        self.schemas.push(schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&SchemaDefinition, SchemaError> {
        self.by_name
            .get(name)
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered schemas in registration order.
    pub fn all(&self) -> impl Iterator<Item = &SchemaDefinition> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
