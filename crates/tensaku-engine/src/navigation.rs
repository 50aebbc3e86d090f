//! Flattened index over every change in an ordered diff list.
//!
//! Each entry contributes its change count as a weight. A prefix sum maps a
//! flat change position to `(entry, offset within entry)` and back:
//!
//! ```text
//! entries   U(A)  M(B, 2 changes)  I(D)  U(C)
//! weights    0          2           1     0
//! prefix    0  0        2           3     3
//! flat            0 1               2
//! ```
//!
//! The index is rebuilt from scratch whenever the list changes.

use crate::entry::DiffEntry;

/// A change located in the ordered diff list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeLocation {
    /// Position of the entry in the ordered list.
    pub entry: usize,
    /// Change within the entry (always 0 for whole-cell changes).
    pub offset: usize,
}

/// Prefix sums over the ordered diff list plus the focused flat position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeNavigator {
    prefix: Vec<usize>,
    position: Option<usize>,
}

impl ChangeNavigator {
    pub fn new(entries: &[DiffEntry]) -> Self {
        let mut nav = Self::default();
        nav.rebuild(entries);
        nav
    }

    /// Recompute prefix sums. The focused position is clamped to the new
    /// total, or cleared when there is nothing left to focus.
    pub fn rebuild(&mut self, entries: &[DiffEntry]) {
        self.prefix.clear();
        self.prefix.reserve(entries.len() + 1);
        let mut total = 0;
        self.prefix.push(0);
        for entry in entries {
            total += entry.change_count();
            self.prefix.push(total);
        }
        self.position = match self.position {
            Some(_) if total == 0 => None,
            Some(p) => Some(p.min(total - 1)),
            None => None,
        };
    }

    /// Total number of changes.
    pub fn total(&self) -> usize {
        self.prefix.last().copied().unwrap_or(0)
    }

    /// Number of entries indexed.
    pub fn len(&self) -> usize {
        self.prefix.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn set_position(&mut self, flat: Option<usize>) {
        self.position = flat.filter(|&p| p < self.total());
    }

    /// Map a flat position to its entry and offset.
    pub fn locate(&self, flat: usize) -> Option<ChangeLocation> {
        if flat >= self.total() {
            return None;
        }
        // Last entry whose start is <= flat and that has weight.
        let entry = self.prefix.partition_point(|&start| start <= flat) - 1;
        Some(ChangeLocation {
            entry,
            offset: flat - self.prefix[entry],
        })
    }

    /// Map an entry and offset to a flat position.
    pub fn flat(&self, location: ChangeLocation) -> Option<usize> {
        let start = *self.prefix.get(location.entry)?;
        let end = *self.prefix.get(location.entry + 1)?;
        let flat = start + location.offset;
        (flat < end).then_some(flat)
    }

    /// First flat position of `entry`, if it has any changes.
    pub fn entry_start(&self, entry: usize) -> Option<usize> {
        self.flat(ChangeLocation { entry, offset: 0 })
    }

    /// Flat position of the first change after `entry`.
    pub fn after_entry(&self, entry: usize) -> Option<usize> {
        let end = *self.prefix.get(entry + 1)?;
        (end < self.total()).then_some(end)
    }

    /// Flat position of the last change before `entry`.
    pub fn before_entry(&self, entry: usize) -> Option<usize> {
        let start = *self.prefix.get(entry)?;
        start.checked_sub(1)
    }

    /// Current location.
    pub fn current(&self) -> Option<ChangeLocation> {
        self.position.and_then(|p| self.locate(p))
    }
}
