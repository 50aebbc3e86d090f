//! Error types for the reconciliation engine.

use tensaku_diff::DiffError;
use tensaku_types::DocumentError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by [`Reconciler`](crate::Reconciler) operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A document edit was rejected; nothing was applied.
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// No entry at this position of the ordered diff list.
    #[error("no diff entry at position {0}")]
    EntryOutOfRange(usize),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
