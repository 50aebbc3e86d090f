//! Line-range mappings between an original and a modified buffer.

use serde::{Deserialize, Serialize};

/// Half-open range of 0-indexed lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One contiguous change: `original` lines became `modified` lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineChange {
    pub original: LineRange,
    pub modified: LineRange,
}

impl LineChange {
    pub fn new(original: LineRange, modified: LineRange) -> Self {
        Self { original, modified }
    }

    /// Pure insertion (nothing removed from the original).
    pub fn is_insertion(&self) -> bool {
        self.original.is_empty()
    }

    /// Pure deletion (nothing added to the modified side).
    pub fn is_deletion(&self) -> bool {
        self.modified.is_empty()
    }
}

/// The sub-cell diff between two buffers.
///
/// `identical` is set when both buffers are byte-for-byte equal, even if the
/// cell is otherwise tracked as modified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    pub changes: Vec<LineChange>,
    pub identical: bool,
}

impl LineDiff {
    /// Diff of two equal buffers.
    pub fn identical() -> Self {
        Self {
            changes: Vec::new(),
            identical: true,
        }
    }

    /// A whole buffer of `lines` lines appearing out of nothing.
    pub fn whole_insert(lines: u32) -> Self {
        Self {
            changes: vec![LineChange::new(LineRange::new(0, 0), LineRange::new(0, lines))],
            identical: false,
        }
    }

    /// A whole buffer of `lines` lines disappearing.
    pub fn whole_delete(lines: u32) -> Self {
        Self {
            changes: vec![LineChange::new(LineRange::new(0, lines), LineRange::new(0, 0))],
            identical: false,
        }
    }

    /// Number of line-change ranges, 0 when flagged identical.
    pub fn change_count(&self) -> usize {
        if self.identical { 0 } else { self.changes.len() }
    }

    /// Check if there is nothing to review.
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}
