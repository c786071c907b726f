//! Schema Adapter subsystem
//!
//! Exposes field and relationship metadata for entity types.
//!
//! # Design Principles
//!
//! - Built once at startup, read-only afterwards
//! - Pure lookups, no runtime introspection
//! - Unknown entities, fields and relationships are errors

mod errors;
mod loader;
mod registry;
mod types;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult};
pub use loader::SchemaLoader;
pub use registry::{SchemaAdapter, SchemaRegistry};
pub use types::{parse_date, Cardinality, EntitySchema, FieldDef, RelationshipDef, ValueKind};
