//! Rule Engine Error Types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
///
/// Lookups by id (toggle, remove, dismiss) never produce an error; a missing
/// id is a no-op.
#[derive(Debug, Error)]
pub enum RuleError {
    /// Malformed rule definition
    #[error("Validation error: {0}")]
    Validation(String),

    /// Data store query failed
    #[error("Data store error: {0}")]
    Store(String),

    /// Evaluator could not produce candidates
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Evaluator exceeded its time budget
    #[error("Evaluator timed out after {0}ms")]
    Timeout(u64),
}

impl RuleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RuleError::Validation(msg.into())
    }
}
