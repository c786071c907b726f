//! Entity schema definitions
//!
//! Supported value kinds:
//! - numeric: integer or floating point
//! - string: UTF-8 string
//! - boolean
//! - date: ISO-8601 date or RFC 3339 timestamp carried as a string
//! - array: homogeneous list of scalars

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Value kind of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Numeric,
    String,
    Boolean,
    Date,
    Array,
}

impl ValueKind {
    /// Returns the kind name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Numeric => "numeric",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Array => "array",
        }
    }

    /// Returns true if `$gt`/`$lt` style comparisons make sense for this kind
    pub fn is_orderable(&self) -> bool {
        matches!(self, ValueKind::Numeric | ValueKind::String | ValueKind::Date)
    }
}

/// Parses a date operand or column value.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::One => "one",
            Cardinality::Many => "many",
        }
    }
}

/// Scalar field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: ValueKind,
}

/// Relationship definition.
///
/// Rows are related when `local_field` on this entity equals
/// `remote_field` on the target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub local_field: String,
    pub remote_field: String,
}

/// Immutable description of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity name
    pub name: String,
    /// Primary key field, always loaded
    pub primary_key: String,
    /// Scalar fields in declaration order
    pub fields: Vec<FieldDef>,
    /// Relationships in declaration order
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
}

impl EntitySchema {
    /// Creates an entity with no fields
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Adds a scalar field
    pub fn with_field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }

    /// Adds a relationship
    pub fn with_relationship(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        local_field: impl Into<String>,
        remote_field: impl Into<String>,
    ) -> Self {
        self.relationships.push(RelationshipDef {
            name: name.into(),
            target: target.into(),
            cardinality,
            local_field: local_field.into(),
            remote_field: remote_field.into(),
        });
        self
    }

    /// Looks up a scalar field
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a relationship
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationship(name).is_some()
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Relationship names in declaration order
    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.iter().map(|r| r.name.as_str())
    }

    /// Validates the entity definition itself (not its references)
    pub fn validate_structure(&self) -> Result<(), String> {
        if !self.has_field(&self.primary_key) {
            return Err(format!(
                "primary key '{}' is not a declared field",
                self.primary_key
            ));
        }

        let mut seen = HashSet::new();
        for name in self.field_names().chain(self.relationship_names()) {
            if name.is_empty() || name.starts_with('$') || name.contains('.') {
                return Err(format!("invalid attribute name '{}'", name));
            }
            if !seen.insert(name) {
                return Err(format!("attribute '{}' declared twice", name));
            }
        }

        for rel in &self.relationships {
            if !self.has_field(&rel.local_field) {
                return Err(format!(
                    "relationship '{}' joins on undeclared field '{}'",
                    rel.name, rel.local_field
                ));
            }
        }

        Ok(())
    }
}
