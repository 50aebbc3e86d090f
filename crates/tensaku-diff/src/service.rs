//! The diff service seam.
//!
//! The reconciliation engine never diffs text itself. It asks a
//! [`DiffService`] for cell correspondences between two documents and for
//! line diffs between two cell buffers. Both calls are asynchronous
//! suspension points; the engine discards results that arrive after a newer
//! request was issued.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tensaku_types::Document;

use crate::error::Result;
use crate::line::LineDiff;

/// How one original cell relates to one modified cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CellCorrespondence {
    Unchanged { original: usize, modified: usize },
    Modified { original: usize, modified: usize },
    Inserted { modified: usize },
    Deleted { original: usize },
}

impl CellCorrespondence {
    pub fn original_index(&self) -> Option<usize> {
        match *self {
            CellCorrespondence::Unchanged { original, .. }
            | CellCorrespondence::Modified { original, .. }
            | CellCorrespondence::Deleted { original } => Some(original),
            CellCorrespondence::Inserted { .. } => None,
        }
    }

    pub fn modified_index(&self) -> Option<usize> {
        match *self {
            CellCorrespondence::Unchanged { modified, .. }
            | CellCorrespondence::Modified { modified, .. }
            | CellCorrespondence::Inserted { modified } => Some(modified),
            CellCorrespondence::Deleted { .. } => None,
        }
    }
}

/// Result of a document-level diff.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellDiff {
    pub correspondences: Vec<CellCorrespondence>,
}

impl CellDiff {
    /// Check that every cell of both documents appears exactly once.
    pub fn covers(&self, original_len: usize, modified_len: usize) -> bool {
        let mut seen_original = vec![false; original_len];
        let mut seen_modified = vec![false; modified_len];
        for c in &self.correspondences {
            if let Some(o) = c.original_index() {
                match seen_original.get_mut(o) {
                    Some(slot) if !*slot => *slot = true,
                    _ => return false,
                }
            }
            if let Some(m) = c.modified_index() {
                match seen_modified.get_mut(m) {
                    Some(slot) if !*slot => *slot = true,
                    _ => return false,
                }
            }
        }
        seen_original.into_iter().all(|s| s) && seen_modified.into_iter().all(|s| s)
    }
}

/// Line and cell diff collaborator.
#[async_trait]
pub trait DiffService: Send + Sync {
    /// Compute cell correspondences between two documents.
    async fn compute_diff(&self, original: &Document, modified: &Document) -> Result<CellDiff>;

    /// Compute the line diff between two buffers.
    async fn compute_line_diff(&self, original: &str, modified: &str) -> Result<LineDiff>;
}
