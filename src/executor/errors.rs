//! Executor error types
//!
//! Errors raised while running a finalized plan. The query facade never
//! reinterprets them.

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for execution
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// `one()` on an empty result
    #[error("No row found")]
    NoResultFound,

    /// `one()` on a result with several rows
    #[error("Multiple rows found: {0}")]
    MultipleResultsFound(usize),

    /// Plan names an entity with no table in the store
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Row data does not fit the table
    #[error("Invalid row in table '{table}': {reason}")]
    InvalidRow { table: String, reason: String },

    /// Store could not be loaded
    #[error("Store error: {0}")]
    Store(String),

    /// Schema lookup failed during execution
    #[error("{0}")]
    Schema(#[from] SchemaError),
}

impl ExecutorError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::NoResultFound => "MQ_NO_RESULT_FOUND",
            ExecutorError::MultipleResultsFound(_) => "MQ_MULTIPLE_RESULTS_FOUND",
            ExecutorError::UnknownTable(_) => "MQ_UNKNOWN_TABLE",
            ExecutorError::InvalidRow { .. } => "MQ_INVALID_ROW",
            ExecutorError::Store(_) => "MQ_STORE_ERROR",
            ExecutorError::Schema(err) => err.code().code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ExecutorError::NoResultFound.to_string(), "No row found");
        assert_eq!(
            ExecutorError::MultipleResultsFound(3).to_string(),
            "Multiple rows found: 3"
        );
        let err = ExecutorError::InvalidRow {
            table: "User".into(),
            reason: "not an object".into(),
        };
        assert_eq!(err.to_string(), "Invalid row in table 'User': not an object");
    }

    #[test]
    fn test_schema_error_keeps_code() {
        let err: ExecutorError = SchemaError::unknown_entity("Order").into();
        assert_eq!(err.code(), "MQ_UNKNOWN_ENTITY");
    }
}
