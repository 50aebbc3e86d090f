//! The diff entry model.
//!
//! One [`DiffEntry`] exists per cell that appears in either document. Entries
//! hold positions into each document's cell arena plus the internal id of the
//! cell they describe; they never hold the cells themselves. Buffers are
//! resolved on demand through [`DiffEntry::buffers`], which gives every
//! variant the same `{ original, modified }` shape: the side without a real
//! cell is an empty placeholder.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tensaku_diff::LineDiff;
use tensaku_types::CellId;

/// Variant tag, used to dispatch keep/undo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EntryTag {
    Unchanged,
    Modified,
    Inserted,
    Deleted,
}

/// How one cell relates across the two documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryKind {
    Unchanged {
        original_index: usize,
        modified_index: usize,
    },
    Modified {
        original_index: usize,
        modified_index: usize,
        line_diff: LineDiff,
    },
    /// Only in the modified document. `line_diff` is a whole-cell insert.
    Inserted { modified_index: usize, line_diff: LineDiff },
    /// Only in the original document. `line_diff` is a whole-cell delete.
    Deleted { original_index: usize, line_diff: LineDiff },
}

/// A cell-level diff entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Internal id shared by both sides of a paired entry.
    pub cell: CellId,
    /// Observation sequence number. Orders deletions against insertions
    /// that land between the same paired neighbours.
    pub seq: u64,
    pub kind: EntryKind,
}

/// One side of a [`BufferPair`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRef {
    /// The cell at `index` of that side's document.
    Cell { index: usize },
    /// Placeholder for the side with no counterpart cell.
    Empty,
}

/// Where to read the original and modified text of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferPair {
    pub original: BufferRef,
    pub modified: BufferRef,
}

impl DiffEntry {
    pub fn unchanged(cell: CellId, original_index: usize, modified_index: usize, seq: u64) -> Self {
        Self {
            cell,
            seq,
            kind: EntryKind::Unchanged {
                original_index,
                modified_index,
            },
        }
    }

    pub fn modified(cell: CellId, original_index: usize, modified_index: usize, line_diff: LineDiff, seq: u64) -> Self {
        Self {
            cell,
            seq,
            kind: EntryKind::Modified {
                original_index,
                modified_index,
                line_diff,
            },
        }
    }

    /// A cell that exists only in the modified document and has `lines` lines.
    pub fn inserted(cell: CellId, modified_index: usize, lines: u32, seq: u64) -> Self {
        Self {
            cell,
            seq,
            kind: EntryKind::Inserted {
                modified_index,
                line_diff: LineDiff::whole_insert(lines),
            },
        }
    }

    /// A cell that exists only in the original document and has `lines` lines.
    pub fn deleted(cell: CellId, original_index: usize, lines: u32, seq: u64) -> Self {
        Self {
            cell,
            seq,
            kind: EntryKind::Deleted {
                original_index,
                line_diff: LineDiff::whole_delete(lines),
            },
        }
    }

    pub fn tag(&self) -> EntryTag {
        match self.kind {
            EntryKind::Unchanged { .. } => EntryTag::Unchanged,
            EntryKind::Modified { .. } => EntryTag::Modified,
            EntryKind::Inserted { .. } => EntryTag::Inserted,
            EntryKind::Deleted { .. } => EntryTag::Deleted,
        }
    }

    pub fn original_index(&self) -> Option<usize> {
        match self.kind {
            EntryKind::Unchanged { original_index, .. }
            | EntryKind::Modified { original_index, .. }
            | EntryKind::Deleted { original_index, .. } => Some(original_index),
            EntryKind::Inserted { .. } => None,
        }
    }

    pub fn modified_index(&self) -> Option<usize> {
        match self.kind {
            EntryKind::Unchanged { modified_index, .. }
            | EntryKind::Modified { modified_index, .. }
            | EntryKind::Inserted { modified_index, .. } => Some(modified_index),
            EntryKind::Deleted { .. } => None,
        }
    }

    /// Check if the entry has a cell on both sides.
    pub fn is_paired(&self) -> bool {
        matches!(self.kind, EntryKind::Unchanged { .. } | EntryKind::Modified { .. })
    }

    pub fn line_diff(&self) -> Option<&LineDiff> {
        match &self.kind {
            EntryKind::Unchanged { .. } => None,
            EntryKind::Modified { line_diff, .. }
            | EntryKind::Inserted { line_diff, .. }
            | EntryKind::Deleted { line_diff, .. } => Some(line_diff),
        }
    }

    /// Number of atomic changes this entry contributes to the total.
    ///
    /// Whole-cell inserts and deletes count once however many lines they
    /// span; a modified cell counts its line-change ranges.
    pub fn change_count(&self) -> usize {
        match &self.kind {
            EntryKind::Unchanged { .. } => 0,
            EntryKind::Inserted { .. } | EntryKind::Deleted { .. } => 1,
            EntryKind::Modified { line_diff, .. } => line_diff.change_count(),
        }
    }

    /// The uniform buffer pair for this entry.
    pub fn buffers(&self) -> BufferPair {
        let side = |index: Option<usize>| match index {
            Some(index) => BufferRef::Cell { index },
            None => BufferRef::Empty,
        };
        BufferPair {
            original: side(self.original_index()),
            modified: side(self.modified_index()),
        }
    }

    pub(crate) fn set_original_index(&mut self, index: usize) {
        match &mut self.kind {
            EntryKind::Unchanged { original_index, .. }
            | EntryKind::Modified { original_index, .. }
            | EntryKind::Deleted { original_index, .. } => *original_index = index,
            EntryKind::Inserted { .. } => {}
        }
    }

    pub(crate) fn set_modified_index(&mut self, index: usize) {
        match &mut self.kind {
            EntryKind::Unchanged { modified_index, .. }
            | EntryKind::Modified { modified_index, .. }
            | EntryKind::Inserted { modified_index, .. } => *modified_index = index,
            EntryKind::Deleted { .. } => {}
        }
    }
}

/// Shift every index at or above `from` by `delta` on one side.
pub(crate) fn shift_indices(entries: &mut [DiffEntry], side: Side, from: usize, delta: isize) {
    if delta == 0 {
        return;
    }
    for entry in entries.iter_mut() {
        let current = match side {
            Side::Original => entry.original_index(),
            Side::Modified => entry.modified_index(),
        };
        let Some(index) = current else { continue };
        if index < from {
            continue;
        }
        let shifted = index.saturating_add_signed(delta);
        match side {
            Side::Original => entry.set_original_index(shifted),
            Side::Modified => entry.set_modified_index(shifted),
        }
    }
}

/// Which document an index refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Original,
    Modified,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensaku_diff::{LineChange, LineRange};
    use tensaku_types::CellKind;

    fn id(n: u64) -> CellId {
        CellId::derive(CellKind::Code, "t", n)
    }

    #[test]
    fn test_placeholder_buffers() {
        let inserted = DiffEntry::inserted(id(0), 3, 2, 0);
        assert_eq!(
            inserted.buffers(),
            BufferPair {
                original: BufferRef::Empty,
                modified: BufferRef::Cell { index: 3 },
            }
        );
        let deleted = DiffEntry::deleted(id(1), 1, 2, 1);
        assert_eq!(deleted.buffers().modified, BufferRef::Empty);
        assert_eq!(deleted.buffers().original, BufferRef::Cell { index: 1 });
    }

    #[test]
    fn test_change_counts() {
        assert_eq!(DiffEntry::unchanged(id(0), 0, 0, 0).change_count(), 0);
        assert_eq!(DiffEntry::inserted(id(1), 0, 40, 0).change_count(), 1);
        assert_eq!(DiffEntry::deleted(id(2), 0, 0, 0).change_count(), 1);

        let diff = LineDiff {
            changes: vec![
                LineChange::new(LineRange::new(0, 1), LineRange::new(0, 1)),
                LineChange::new(LineRange::new(4, 4), LineRange::new(4, 6)),
            ],
            identical: false,
        };
        let mut modified = DiffEntry::modified(id(3), 0, 0, diff, 0);
        assert_eq!(modified.change_count(), 2);

        if let EntryKind::Modified { line_diff, .. } = &mut modified.kind {
            line_diff.identical = true;
        }
        assert_eq!(modified.change_count(), 0);
    }

    #[test]
    fn test_shift_skips_missing_side() {
        let mut entries = vec![
            DiffEntry::unchanged(id(0), 0, 0, 0),
            DiffEntry::deleted(id(1), 1, 1, 1),
            DiffEntry::unchanged(id(2), 2, 1, 2),
            DiffEntry::inserted(id(3), 2, 1, 3),
        ];
        shift_indices(&mut entries, Side::Modified, 1, 1);
        assert_eq!(entries[0].modified_index(), Some(0));
        assert_eq!(entries[1].modified_index(), None);
        assert_eq!(entries[2].modified_index(), Some(2));
        assert_eq!(entries[3].modified_index(), Some(3));

        shift_indices(&mut entries, Side::Original, 2, -1);
        assert_eq!(entries[1].original_index(), Some(1));
        assert_eq!(entries[2].original_index(), Some(1));
    }

    #[test]
    fn test_tag_parses() {
        assert_eq!("inserted".parse::<EntryTag>().unwrap(), EntryTag::Inserted);
        assert_eq!(EntryTag::Deleted.to_string(), "deleted");
    }
}
