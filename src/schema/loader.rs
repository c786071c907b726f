//! Schema loader for the one-time metadata loading step
//!
//! The schema file is a JSON document:
//!
//! ```json
//! {
//!   "entities": [
//!     {
//!       "name": "User",
//!       "primary_key": "id",
//!       "fields": [{"name": "id", "kind": "numeric"}],
//!       "relationships": [
//!         {"name": "articles", "target": "Article", "cardinality": "many",
//!          "local_field": "id", "remote_field": "uid"}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Malformed files fail the load; nothing is partially registered.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{SchemaError, SchemaResult};
use super::registry::SchemaRegistry;
use super::types::EntitySchema;

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    entities: Vec<EntitySchema>,
}

/// Loads entity schemas into a read-only registry.
pub struct SchemaLoader;

impl SchemaLoader {
    /// Loads a schema file from disk.
    pub fn load_file(path: &Path) -> SchemaResult<SchemaRegistry> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;

        Self::load_str(&path.display().to_string(), &content)
    }

    /// Loads schemas from JSON text. `source` names the origin in errors.
    pub fn load_str(source: &str, content: &str) -> SchemaResult<SchemaRegistry> {
        let document: SchemaDocument = serde_json::from_str(content)
            .map_err(|e| SchemaError::malformed(source, format!("Invalid JSON: {}", e)))?;

        let registry = SchemaRegistry::from_entities(document.entities)?;

        let count = registry.len().to_string();
        log_event_with_fields(Event::SchemasLoaded, &[("entities", &count), ("source", source)]);

        Ok(registry)
    }
}
