//! Read-only entity registry
//!
//! Built once at startup, then shared by every query facade. Lookups are
//! pure and never mutate the registry.

use std::collections::{BTreeMap, HashMap};

use super::errors::{SchemaError, SchemaResult};
use super::types::{Cardinality, EntitySchema, ValueKind};

/// Schema metadata provider consumed by the planner
pub trait SchemaAdapter {
    /// Resolves an entity by name
    fn entity(&self, name: &str) -> SchemaResult<&EntitySchema>;

    /// Scalar fields of an entity with their value kinds
    fn fields(&self, entity: &str) -> SchemaResult<Vec<(&str, ValueKind)>> {
        Ok(self
            .entity(entity)?
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.kind))
            .collect())
    }

    /// Relationships of an entity: name -> (target entity, cardinality)
    fn relationships(&self, entity: &str) -> SchemaResult<BTreeMap<&str, (&str, Cardinality)>> {
        Ok(self
            .entity(entity)?
            .relationships
            .iter()
            .map(|r| (r.name.as_str(), (r.target.as_str(), r.cardinality)))
            .collect())
    }
}

/// In-memory entity registry
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a set of entities and checks cross references.
    pub fn from_entities(entities: impl IntoIterator<Item = EntitySchema>) -> SchemaResult<Self> {
        let mut registry = Self::new();
        for entity in entities {
            registry.register(entity)?;
        }
        registry.validate_references()?;
        Ok(registry)
    }

    /// Registers one entity. Entities are immutable once registered.
    pub fn register(&mut self, entity: EntitySchema) -> SchemaResult<()> {
        entity
            .validate_structure()
            .map_err(|reason| SchemaError::malformed(&entity.name, reason))?;

        if self.entities.contains_key(&entity.name) {
            return Err(SchemaError::duplicate_entity(&entity.name));
        }

        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Checks that every relationship targets a registered entity and joins
    /// on a field the target declares.
    pub fn validate_references(&self) -> SchemaResult<()> {
        let mut names: Vec<&String> = self.entities.keys().collect();
        names.sort();

        for name in names {
            let entity = &self.entities[name];
            for rel in &entity.relationships {
                let target = self.entities.get(&rel.target).ok_or_else(|| {
                    SchemaError::malformed(
                        &entity.name,
                        format!(
                            "relationship '{}' targets unknown entity '{}'",
                            rel.name, rel.target
                        ),
                    )
                })?;
                if !target.has_field(&rel.remote_field) {
                    return Err(SchemaError::malformed(
                        &entity.name,
                        format!(
                            "relationship '{}' joins on '{}.{}' which is not declared",
                            rel.name, rel.target, rel.remote_field
                        ),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entity names in sorted order
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl SchemaAdapter for SchemaRegistry {
    fn entity(&self, name: &str) -> SchemaResult<&EntitySchema> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::unknown_entity(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaErrorCode;

    fn entities() -> Vec<EntitySchema> {
        vec![
            EntitySchema::new("User", "id")
                .with_field("id", ValueKind::Numeric)
                .with_field("age", ValueKind::Numeric)
                .with_relationship("articles", "Article", Cardinality::Many, "id", "uid"),
            EntitySchema::new("Article", "id")
                .with_field("id", ValueKind::Numeric)
                .with_field("uid", ValueKind::Numeric)
                .with_relationship("author", "User", Cardinality::One, "uid", "id"),
        ]
    }

    #[test]
    fn test_fields_and_relationships() {
        let registry = SchemaRegistry::from_entities(entities()).unwrap();

        let fields = registry.fields("User").unwrap();
        assert_eq!(
            fields,
            vec![("id", ValueKind::Numeric), ("age", ValueKind::Numeric)]
        );

        let rels = registry.relationships("Article").unwrap();
        assert_eq!(rels.get("author"), Some(&("User", Cardinality::One)));
    }

    #[test]
    fn test_unknown_entity() {
        let registry = SchemaRegistry::from_entities(entities()).unwrap();
        let err = registry.fields("Order").unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::UnknownEntity);
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let mut registry = SchemaRegistry::from_entities(entities()).unwrap();
        let err = registry
            .register(EntitySchema::new("User", "id").with_field("id", ValueKind::Numeric))
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::DuplicateEntity);
    }

    #[test]
    fn test_dangling_relationship_target() {
        let mut list = entities();
        list.truncate(1);
        let err = SchemaRegistry::from_entities(list).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::MalformedSchema);
        assert!(err.message().contains("Article"));
    }

    #[test]
    fn test_entity_names_sorted() {
        let registry = SchemaRegistry::from_entities(entities()).unwrap();
        assert_eq!(registry.entity_names(), vec!["Article", "User"]);
        assert_eq!(registry.len(), 2);
    }
}
