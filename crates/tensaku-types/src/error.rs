//! Error types for document operations.

use thiserror::Error;

use crate::ids::CellId;

/// Errors that can occur while editing a document.
#[derive(Error, Debug, PartialEq)]
pub enum DocumentError {
    /// Cell index past the end of the document.
    #[error("cell index {index} out of range (document has {len} cells)")]
    CellIndexOutOfRange { index: usize, len: usize },

    /// Cell with this internal id is not in the document.
    #[error("cell not found: {0:?}")]
    CellNotFound(CellId),

    /// Inserting a cell whose internal id already exists.
    #[error("cell already exists: {0:?}")]
    DuplicateCell(CellId),

    /// The requested line number is out of range.
    #[error("line {requested} is out of range (buffer has {max} lines)")]
    LineOutOfRange { requested: u32, max: u32 },

    /// An edit inside an atomic batch failed; nothing was applied.
    #[error("atomic edit failed at operation {op_index}: {error}")]
    AtomicBatchFailed {
        op_index: usize,
        error: Box<DocumentError>,
    },

    /// Malformed edit parameters.
    #[error("invalid edit: {0}")]
    InvalidEdit(String),
}

impl DocumentError {
    /// Wrap an error as a batch failure.
    pub fn in_batch(self, op_index: usize) -> Self {
        Self::AtomicBatchFailed {
            op_index,
            error: Box::new(self),
        }
    }
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
