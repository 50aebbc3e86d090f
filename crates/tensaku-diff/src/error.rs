//! Error types for diff computation.

use thiserror::Error;

/// Errors a [`DiffService`](crate::DiffService) can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiffError {
    /// The service could not be reached or refused the request.
    #[error("diff service unavailable: {0}")]
    Unavailable(String),

    /// The service produced a result that does not fit the inputs.
    #[error("malformed diff result: {0}")]
    Malformed(String),
}

/// Result type for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;
