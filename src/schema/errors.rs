//! Schema error types
//!
//! Error codes:
//! - MQ_UNKNOWN_ENTITY
//! - MQ_UNKNOWN_FIELD
//! - MQ_UNKNOWN_RELATIONSHIP
//! - MQ_DUPLICATE_ENTITY
//! - MQ_MALFORMED_SCHEMA

use std::fmt;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Entity type not registered
    UnknownEntity,
    /// Field not declared on the entity
    UnknownField,
    /// Relationship not declared on the entity
    UnknownRelationship,
    /// Entity registered twice
    DuplicateEntity,
    /// Schema document or entity definition is inconsistent
    MalformedSchema,
}

impl SchemaErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::UnknownEntity => "MQ_UNKNOWN_ENTITY",
            SchemaErrorCode::UnknownField => "MQ_UNKNOWN_FIELD",
            SchemaErrorCode::UnknownRelationship => "MQ_UNKNOWN_RELATIONSHIP",
            SchemaErrorCode::DuplicateEntity => "MQ_DUPLICATE_ENTITY",
            SchemaErrorCode::MalformedSchema => "MQ_MALFORMED_SCHEMA",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with lookup context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    /// Entity the lookup ran against
    entity: Option<String>,
    /// Field or relationship name that failed to resolve
    name: Option<String>,
}

impl SchemaError {
    /// Create an unknown entity error
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            code: SchemaErrorCode::UnknownEntity,
            message: format!("Entity '{}' is not registered", entity),
            entity: Some(entity),
            name: None,
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self {
            code: SchemaErrorCode::UnknownField,
            message: format!("Entity '{}' has no field '{}'", entity, field),
            entity: Some(entity),
            name: Some(field),
        }
    }

    /// Create an unknown relationship error
    pub fn unknown_relationship(entity: impl Into<String>, relationship: impl Into<String>) -> Self {
        let entity = entity.into();
        let relationship = relationship.into();
        Self {
            code: SchemaErrorCode::UnknownRelationship,
            message: format!("Entity '{}' has no relationship '{}'", entity, relationship),
            entity: Some(entity),
            name: Some(relationship),
        }
    }

    /// Create a duplicate entity error
    pub fn duplicate_entity(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            code: SchemaErrorCode::DuplicateEntity,
            message: format!("Entity '{}' is already registered", entity),
            entity: Some(entity),
            name: None,
        }
    }

    /// Create a malformed schema error
    pub fn malformed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::MalformedSchema,
            message: format!("Malformed schema '{}': {}", source.into(), reason.into()),
            entity: None,
            name: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the entity name if applicable
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Returns the unresolved field or relationship name if applicable
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SchemaErrorCode::UnknownEntity.code(), "MQ_UNKNOWN_ENTITY");
        assert_eq!(SchemaErrorCode::UnknownField.code(), "MQ_UNKNOWN_FIELD");
        assert_eq!(
            SchemaErrorCode::UnknownRelationship.code(),
            "MQ_UNKNOWN_RELATIONSHIP"
        );
        assert_eq!(SchemaErrorCode::MalformedSchema.code(), "MQ_MALFORMED_SCHEMA");
    }

    #[test]
    fn test_unknown_field_context() {
        let err = SchemaError::unknown_field("User", "salary");
        assert_eq!(err.entity(), Some("User"));
        assert_eq!(err.name(), Some("salary"));

        let display = format!("{}", err);
        assert!(display.contains("MQ_UNKNOWN_FIELD"));
        assert!(display.contains("salary"));
    }
}
