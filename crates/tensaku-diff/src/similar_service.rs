//! Default [`DiffService`] built on the `similar` crate.
//!
//! Cell correspondence is a slice diff over per-cell keys. A cell whose
//! internal id also exists on the other side is keyed by that id, so an
//! edited cell still lines up with its baseline; any other cell is keyed by
//! kind and source. Runs the slice diff reports as replaced are paired
//! positionally as `Modified` while kinds agree; leftovers become
//! `Deleted`/`Inserted`.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, DiffTag, TextDiff};
use strum::EnumString;
use tensaku_types::{Cell, CellId, Document};

use crate::error::Result;
use crate::line::{LineChange, LineDiff, LineRange};
use crate::service::{CellCorrespondence, CellDiff, DiffService};

/// Which diff algorithm to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum LineDiffAlgorithm {
    #[default]
    Myers,
    Patience,
}

impl From<LineDiffAlgorithm> for Algorithm {
    fn from(a: LineDiffAlgorithm) -> Self {
        match a {
            LineDiffAlgorithm::Myers => Algorithm::Myers,
            LineDiffAlgorithm::Patience => Algorithm::Patience,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum CellKey<'a> {
    Shared(CellId),
    Content(&'a str, &'a str),
}

fn cell_key<'a>(cell: &'a Cell, shared: &HashSet<CellId>) -> CellKey<'a> {
    if shared.contains(&cell.id) {
        CellKey::Shared(cell.id)
    } else {
        CellKey::Content(cell.kind.as_str(), cell.source.as_str())
    }
}

/// In-process diff service.
#[derive(Clone, Debug, Default)]
pub struct SimilarDiffService {
    algorithm: LineDiffAlgorithm,
}

impl SimilarDiffService {
    pub fn new(algorithm: LineDiffAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Synchronous core of [`DiffService::compute_diff`].
    pub fn diff_documents(&self, original: &Document, modified: &Document) -> CellDiff {
        let original_ids: HashSet<CellId> = original.ids().collect();
        let shared: HashSet<CellId> = modified.ids().filter(|id| original_ids.contains(id)).collect();

        let old_keys: Vec<CellKey<'_>> = original.cells().map(|c| cell_key(c, &shared)).collect();
        let new_keys: Vec<CellKey<'_>> = modified.cells().map(|c| cell_key(c, &shared)).collect();

        let ops = similar::capture_diff_slices(self.algorithm.into(), &old_keys, &new_keys);
        let mut correspondences = Vec::with_capacity(old_keys.len().max(new_keys.len()));

        let pair = |o: usize, m: usize| -> CellCorrespondence {
            let same = match (original.cell(o), modified.cell(m)) {
                (Some(a), Some(b)) => a.kind == b.kind && a.source == b.source,
                _ => false,
            };
            if same {
                CellCorrespondence::Unchanged { original: o, modified: m }
            } else {
                CellCorrespondence::Modified { original: o, modified: m }
            }
        };

        for op in ops {
            match op {
                DiffOp::Equal { old_index, new_index, len } => {
                    for k in 0..len {
                        correspondences.push(pair(old_index + k, new_index + k));
                    }
                }
                DiffOp::Delete { old_index, old_len, .. } => {
                    for k in 0..old_len {
                        correspondences.push(CellCorrespondence::Deleted { original: old_index + k });
                    }
                }
                DiffOp::Insert { new_index, new_len, .. } => {
                    for k in 0..new_len {
                        correspondences.push(CellCorrespondence::Inserted { modified: new_index + k });
                    }
                }
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    let paired = old_len.min(new_len);
                    let mut k = 0;
                    while k < paired {
                        let same_kind = match (original.cell(old_index + k), modified.cell(new_index + k)) {
                            (Some(a), Some(b)) => a.kind == b.kind,
                            _ => false,
                        };
                        if !same_kind {
                            break;
                        }
                        correspondences.push(CellCorrespondence::Modified {
                            original: old_index + k,
                            modified: new_index + k,
                        });
                        k += 1;
                    }
                    for o in k..old_len {
                        correspondences.push(CellCorrespondence::Deleted { original: old_index + o });
                    }
                    for m in k..new_len {
                        correspondences.push(CellCorrespondence::Inserted { modified: new_index + m });
                    }
                }
            }
        }

        CellDiff { correspondences }
    }

    /// Synchronous core of [`DiffService::compute_line_diff`].
    pub fn diff_lines(&self, original: &str, modified: &str) -> LineDiff {
        if original == modified {
            return LineDiff::identical();
        }

        let diff = TextDiff::configure()
            .algorithm(self.algorithm.into())
            .diff_lines(original, modified);

        let mut changes: Vec<LineChange> = Vec::new();
        for op in diff.ops() {
            if op.tag() == DiffTag::Equal {
                continue;
            }
            let old = op.old_range();
            let new = op.new_range();
            let original_range = LineRange::new(old.start as u32, old.end as u32);
            let modified_range = LineRange::new(new.start as u32, new.end as u32);

            match changes.last_mut() {
                Some(last)
                    if last.original.end == original_range.start
                        && last.modified.end == modified_range.start =>
                {
                    last.original.end = original_range.end;
                    last.modified.end = modified_range.end;
                }
                _ => changes.push(LineChange::new(original_range, modified_range)),
            }
        }

        LineDiff {
            changes,
            identical: false,
        }
    }
}

#[async_trait]
impl DiffService for SimilarDiffService {
    async fn compute_diff(&self, original: &Document, modified: &Document) -> Result<CellDiff> {
        let diff = self.diff_documents(original, modified);
        tracing::debug!(
            original = original.len(),
            modified = modified.len(),
            correspondences = diff.correspondences.len(),
            "computed cell diff"
        );
        Ok(diff)
    }

    async fn compute_line_diff(&self, original: &str, modified: &str) -> Result<LineDiff> {
        Ok(self.diff_lines(original, modified))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tensaku_types::{CellEdit, EditOrigin, TextEdit};

    fn doc(sources: &[&str]) -> Document {
        Document::new("mem://t", sources.iter().map(|s| Cell::code(*s)).collect())
    }

    #[test]
    fn test_identical_documents_are_all_unchanged() {
        let a = doc(&["a", "b"]);
        let b = doc(&["a", "b"]);
        let diff = SimilarDiffService::default().diff_documents(&a, &b);
        assert_eq!(
            diff.correspondences,
            vec![
                CellCorrespondence::Unchanged { original: 0, modified: 0 },
                CellCorrespondence::Unchanged { original: 1, modified: 1 },
            ]
        );
    }

    #[test]
    fn test_edited_cell_pairs_by_shared_id() {
        let original = doc(&["a\n", "b\n", "c\n"]);
        let mut modified = original.clone();
        modified
            .apply(
                vec![
                    CellEdit::Content { index: 1, edits: vec![TextEdit::replace(0, 1, "B\nB2\n")] },
                    CellEdit::insert(3, vec![Cell::code("d\n")]),
                ],
                EditOrigin::Agent,
            )
            .unwrap();

        let diff = SimilarDiffService::default().diff_documents(&original, &modified);
        assert_eq!(
            diff.correspondences,
            vec![
                CellCorrespondence::Unchanged { original: 0, modified: 0 },
                CellCorrespondence::Modified { original: 1, modified: 1 },
                CellCorrespondence::Unchanged { original: 2, modified: 2 },
                CellCorrespondence::Inserted { modified: 3 },
            ]
        );
        assert!(diff.covers(3, 4));
    }

    #[test]
    fn test_replaced_run_pairs_by_kind() {
        let original = Document::new("mem://o", vec![Cell::code("x"), Cell::markup("# t")]);
        let modified = Document::new("mem://m", vec![Cell::code("y"), Cell::code("z")]);
        let diff = SimilarDiffService::default().diff_documents(&original, &modified);
        assert!(diff.covers(2, 2));
        assert_eq!(diff.correspondences[0], CellCorrespondence::Modified { original: 0, modified: 0 });
        assert!(diff.correspondences.contains(&CellCorrespondence::Deleted { original: 1 }));
        assert!(diff.correspondences.contains(&CellCorrespondence::Inserted { modified: 1 }));
    }

    #[test]
    fn test_line_diff_merges_replace() {
        let diff = SimilarDiffService::default().diff_lines("a\nb\nc\n", "a\nB\nc\nd\n");
        assert!(!diff.identical);
        assert_eq!(
            diff.changes,
            vec![
                LineChange::new(LineRange::new(1, 2), LineRange::new(1, 2)),
                LineChange::new(LineRange::new(3, 3), LineRange::new(3, 4)),
            ]
        );
    }

    #[test]
    fn test_line_diff_identical() {
        let diff = SimilarDiffService::new(LineDiffAlgorithm::Patience).diff_lines("same\n", "same\n");
        assert!(diff.identical);
        assert_eq!(diff.change_count(), 0);
    }

    #[tokio::test]
    async fn test_service_trait_delegates() {
        let service = SimilarDiffService::default();
        let diff = service.compute_line_diff("", "new\n").await.unwrap();
        assert_eq!(diff.changes, vec![LineChange::new(LineRange::new(0, 0), LineRange::new(0, 1))]);
    }
}
