//! Planner error types
//!
//! Every error is raised by the clause call that introduced it; a rejected
//! clause leaves the facade unchanged.
//!
//! Error codes:
//! - MQ_SCHEMA_ERROR
//! - MQ_UNKNOWN_OPERATOR
//! - MQ_PROJECTION_CONFLICT
//! - MQ_UNRESOLVED_PATH
//! - MQ_MODE_CONFLICT
//! - MQ_INVALID_OPERAND
//! - MQ_FINALIZED_PLAN
//! - MQ_INVALID_DOCUMENT

use std::fmt;

use crate::schema::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Unknown entity, field or relationship
    Schema,
    /// Unrecognized `$` operator token
    UnknownOperator,
    /// Include and exclude markers mixed in one projection
    ProjectionConflict,
    /// Dotted path with no backing join
    UnresolvedPath,
    /// Clause incompatible with the current terminal mode
    ModeConflict,
    /// Operand type does not fit the field or operator
    InvalidOperand,
    /// Clause applied after `end()`
    FinalizedPlan,
    /// Malformed clause structure
    InvalidDocument,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::Schema => "MQ_SCHEMA_ERROR",
            PlannerErrorCode::UnknownOperator => "MQ_UNKNOWN_OPERATOR",
            PlannerErrorCode::ProjectionConflict => "MQ_PROJECTION_CONFLICT",
            PlannerErrorCode::UnresolvedPath => "MQ_UNRESOLVED_PATH",
            PlannerErrorCode::ModeConflict => "MQ_MODE_CONFLICT",
            PlannerErrorCode::InvalidOperand => "MQ_INVALID_OPERAND",
            PlannerErrorCode::FinalizedPlan => "MQ_FINALIZED_PLAN",
            PlannerErrorCode::InvalidDocument => "MQ_INVALID_DOCUMENT",
        }
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error with the clause and field it was raised for
#[derive(Debug, Clone)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    clause: Option<&'static str>,
    field: Option<String>,
    schema: Option<SchemaError>,
}

impl PlannerError {
    fn new(code: PlannerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            clause: None,
            field: None,
            schema: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Create an unknown operator error
    pub fn unknown_operator(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::new(
            PlannerErrorCode::UnknownOperator,
            format!("Unknown operator '{}'", token),
        )
    }

    /// Create a projection conflict error
    pub fn projection_conflict(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::ProjectionConflict, reason)
    }

    /// Create an unresolved path error
    pub fn unresolved_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            PlannerErrorCode::UnresolvedPath,
            format!("Path '{}': {}", path, reason.into()),
        )
        .with_field(path)
    }

    /// Create a mode conflict error
    pub fn mode_conflict(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::ModeConflict, reason)
    }

    /// Create an invalid operand error
    pub fn invalid_operand(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            PlannerErrorCode::InvalidOperand,
            format!("Field '{}': {}", field, reason.into()),
        )
        .with_field(field)
    }

    /// Create an invalid operand error for a value that is not tied to a field
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::InvalidOperand, reason)
    }

    /// Create a finalized plan error
    pub fn finalized_plan() -> Self {
        Self::new(
            PlannerErrorCode::FinalizedPlan,
            "Query was already finalized with end()",
        )
    }

    /// Create an invalid document error
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::InvalidDocument, reason)
    }

    /// Tags the error with the clause that raised it
    pub(crate) fn in_clause(mut self, clause: &'static str) -> Self {
        if self.clause.is_none() {
            self.clause = Some(clause);
        }
        self
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Clause that raised the error (`filter`, `sort`, ...)
    pub fn clause(&self) -> Option<&'static str> {
        self.clause
    }

    /// Offending field or path if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Underlying schema lookup failure for `MQ_SCHEMA_ERROR`
    pub fn schema_error(&self) -> Option<&SchemaError> {
        self.schema.as_ref()
    }
}

impl From<SchemaError> for PlannerError {
    fn from(err: SchemaError) -> Self {
        let mut planner = Self::new(PlannerErrorCode::Schema, err.message());
        planner.field = err.name().map(str::to_string);
        planner.schema = Some(err);
        planner
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.code.code())?;
        if let Some(clause) = self.clause {
            write!(f, "{}: ", clause)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.schema
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PlannerErrorCode::Schema.code(), "MQ_SCHEMA_ERROR");
        assert_eq!(PlannerErrorCode::UnknownOperator.code(), "MQ_UNKNOWN_OPERATOR");
        assert_eq!(
            PlannerErrorCode::ProjectionConflict.code(),
            "MQ_PROJECTION_CONFLICT"
        );
        assert_eq!(PlannerErrorCode::UnresolvedPath.code(), "MQ_UNRESOLVED_PATH");
        assert_eq!(PlannerErrorCode::ModeConflict.code(), "MQ_MODE_CONFLICT");
        assert_eq!(PlannerErrorCode::FinalizedPlan.code(), "MQ_FINALIZED_PLAN");
    }

    #[test]
    fn test_display_includes_clause() {
        let err = PlannerError::unknown_operator("$regex").in_clause("filter");
        assert_eq!(
            err.to_string(),
            "[MQ_UNKNOWN_OPERATOR] filter: Unknown operator '$regex'"
        );
    }

    #[test]
    fn test_first_clause_tag_wins() {
        let err = PlannerError::finalized_plan()
            .in_clause("join")
            .in_clause("document");
        assert_eq!(err.clause(), Some("join"));
    }

    #[test]
    fn test_schema_error_conversion() {
        let err: PlannerError = SchemaError::unknown_field("User", "salary").into();
        assert_eq!(err.code(), PlannerErrorCode::Schema);
        assert_eq!(err.field(), Some("salary"));
        assert!(err.schema_error().is_some());
        assert!(std::error::Error::source(&err).is_some());
    }
}
