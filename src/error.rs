//! Query Error Types
//!
//! The tagged union every layer of a query surfaces through, and its
//! mapping onto the small set of wire status codes. Inside a task,
//! recoverable conditions (a null value during kNN, an empty range) are
//! handled locally and never reach this type.

use crate::record::ValidationError;
use crate::storage::StorageError;
use crate::value::ValueError;
use std::time::Duration;
use thiserror::Error;

/// Crate-wide query errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query references an unknown schema, entity, or column
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Query is structurally valid but cannot be bound
    #[error("bind error: {0}")]
    Bind(String),

    /// Malformed query: missing required field, empty predicate
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Value incompatible with its column's declared type
    #[error("type error: {0}")]
    Type(String),

    /// Vector element count differs from the column's logical size
    #[error("size error: expected {expected} elements, got {got}")]
    Size { expected: usize, got: usize },

    /// Page access or column I/O failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A parent task failed, so this task cannot run
    #[error("execution error: {0}")]
    Execution(String),

    /// The plan was cancelled before this task finished
    #[error("query cancelled")]
    Cancelled,

    /// The plan exceeded its deadline
    #[error("query exceeded timeout of {timeout:?} (ran for {elapsed:?})")]
    Timeout { timeout: Duration, elapsed: Duration },

    /// Unclassified
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Wire status codes query failures collapse onto. The description sent
/// alongside is the error's display string; stack traces never leave the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
    DeadlineExceeded,
    Cancelled,
    Unknown,
}

impl QueryError {
    /// Status code this error maps to at the wire boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            QueryError::NotFound { .. } => StatusCode::NotFound,
            QueryError::Bind(_) | QueryError::Syntax(_) => StatusCode::InvalidArgument,
            QueryError::Type(_) | QueryError::Size { .. } => StatusCode::FailedPrecondition,
            QueryError::Storage(_) | QueryError::Execution(_) => StatusCode::Internal,
            QueryError::Timeout { .. } => StatusCode::DeadlineExceeded,
            QueryError::Cancelled => StatusCode::Cancelled,
            QueryError::Unknown(_) => StatusCode::Unknown,
        }
    }
}

impl From<ValueError> for QueryError {
    fn from(e: ValueError) -> Self {
        QueryError::Type(e.to_string())
    }
}

impl From<ValidationError> for QueryError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::SizeMismatch { expected, got, .. } => {
                QueryError::Size { expected, got }
            }
            other => QueryError::Type(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = QueryError::NotFound {
            kind: "entity",
            name: "warren.rabbits".into(),
        };
        assert_eq!(err.status(), StatusCode::NotFound);
        assert_eq!(
            QueryError::Bind("bad projection".into()).status(),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            QueryError::Size {
                expected: 3,
                got: 2
            }
            .status(),
            StatusCode::FailedPrecondition
        );
        assert_eq!(QueryError::Cancelled.status(), StatusCode::Cancelled);
        assert_eq!(
            QueryError::Timeout {
                timeout: Duration::from_secs(1),
                elapsed: Duration::from_secs(2)
            }
            .status(),
            StatusCode::DeadlineExceeded
        );
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = QueryError::NotFound {
            kind: "column",
            name: "warren.rabbits.ears".into(),
        };
        assert_eq!(err.to_string(), "column not found: warren.rabbits.ears");
    }
}
