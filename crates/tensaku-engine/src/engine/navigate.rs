//! Next/previous navigation and acting on the focused change.
//!
//! Positions live in the flattened change index. Inside a modified cell the
//! cell's tracker walks its own line changes first; only when it runs out
//! does navigation move to the neighbouring entry. Whole-cell inserts and
//! deletes are single stops.

use tensaku_types::CellId;

use super::Reconciler;
use crate::entry::{EntryKind, Side};
use crate::error::Result;
use crate::events::SessionEvent;
use crate::navigation::ChangeLocation;
use crate::tracker::CellTracker;

/// The change navigation currently points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusedChange {
    /// Position of the entry in the ordered list.
    pub entry: usize,
    pub cell: CellId,
    /// Line change within a modified cell; `None` for whole-cell changes.
    pub change: Option<usize>,
    /// Position in the flattened index.
    pub flat: usize,
}

impl Reconciler {
    /// The focused change, if any.
    pub fn focused_change(&self) -> Option<FocusedChange> {
        let flat = self.navigator.position()?;
        let ChangeLocation { entry, offset } = self.navigator.locate(flat)?;
        let diff_entry = self.entries.get(entry)?;
        let change = matches!(diff_entry.kind, EntryKind::Modified { .. }).then_some(offset);
        Some(FocusedChange {
            entry,
            cell: diff_entry.cell,
            change,
            flat,
        })
    }

    /// Move to the next change.
    ///
    /// Returns `None` without moving when already at the last change and
    /// `wrap` is off, or when there are no changes.
    pub fn next_change(&mut self, wrap: bool) -> Option<FocusedChange> {
        let total = self.navigator.total();
        if total == 0 {
            return None;
        }
        let target = match self.navigator.current() {
            None => Some(0),
            Some(location) => match self.step_within(location.entry, CellTracker::next_change) {
                Some(offset) => self.navigator.flat(ChangeLocation {
                    entry: location.entry,
                    offset,
                }),
                None => self.navigator.after_entry(location.entry).or(wrap.then_some(0)),
            },
        };
        self.focus(target)
    }

    /// Move to the previous change. Mirrors [`next_change`](Self::next_change).
    pub fn previous_change(&mut self, wrap: bool) -> Option<FocusedChange> {
        let total = self.navigator.total();
        if total == 0 {
            return None;
        }
        let target = match self.navigator.current() {
            None => Some(total - 1),
            Some(location) => match self.step_within(location.entry, CellTracker::previous_change) {
                Some(offset) => self.navigator.flat(ChangeLocation {
                    entry: location.entry,
                    offset,
                }),
                None => self
                    .navigator
                    .before_entry(location.entry)
                    .or(wrap.then_some(total - 1)),
            },
        };
        self.focus(target)
    }

    /// Focus the first change of `cell`.
    pub fn reveal(&mut self, cell: CellId) -> Option<FocusedChange> {
        let entry = self.position_of(cell)?;
        let flat = self.navigator.entry_start(entry)?;
        self.focus(Some(flat))
    }

    /// Keep the focused change and move on to the next one.
    ///
    /// Inside a modified cell this keeps only the focused line change;
    /// otherwise the whole entry. With nothing focused, the first change is
    /// used. Returns the change focused afterwards.
    pub async fn accept_nearest_change(&mut self) -> Result<Option<FocusedChange>> {
        self.settle_nearest(true).await
    }

    /// Undo the focused change and move on to the next one.
    pub async fn reject_nearest_change(&mut self) -> Result<Option<FocusedChange>> {
        self.settle_nearest(false).await
    }

    async fn settle_nearest(&mut self, keep: bool) -> Result<Option<FocusedChange>> {
        let focused = match self.focused_change() {
            Some(focused) => focused,
            None => {
                self.navigator.set_position(Some(0));
                match self.focused_change() {
                    Some(focused) => focused,
                    None => return Ok(None),
                }
            }
        };

        let checkpoint = self.checkpoint();
        let applied = match (focused.change, keep) {
            (Some(change), true) => self.settle_change(focused.cell, change, Side::Original).await?,
            (Some(change), false) => self.settle_change(focused.cell, change, Side::Modified).await?,
            (None, true) => self.keep_entry(focused.cell)?,
            (None, false) => self.undo_entry(focused.cell)?,
        };
        self.record_if(checkpoint, applied);

        // The following change slides into the same flat position.
        let total = self.navigator.total();
        let next = if total == 0 {
            None
        } else if focused.flat < total {
            Some(focused.flat)
        } else if self.config.wrap_navigation {
            Some(0)
        } else {
            Some(total - 1)
        };
        Ok(self.focus(next))
    }

    /// Flip between the diff view and the plain modified view.
    pub fn toggle_diff_view(&mut self) -> bool {
        self.diff_view = !self.diff_view;
        self.emit(SessionEvent::DiffViewToggled(self.diff_view));
        self.diff_view
    }

    /// Let a modified cell's tracker step its own cursor.
    fn step_within(&mut self, entry: usize, step: fn(&mut CellTracker) -> Option<usize>) -> Option<usize> {
        let diff_entry = self.entries.get(entry)?;
        if !matches!(diff_entry.kind, EntryKind::Modified { .. }) {
            return None;
        }
        self.trackers.get_mut(&diff_entry.cell).and_then(step)
    }

    fn focus(&mut self, flat: Option<usize>) -> Option<FocusedChange> {
        if flat.is_some() {
            self.navigator.set_position(flat);
        }
        self.sync_focus();
        let focused = flat.and(self.focused_change())?;
        self.emit(SessionEvent::Revealed {
            cell: focused.cell,
            entry: focused.entry,
            change: focused.change,
        });
        Some(focused)
    }

    /// Point tracker cursors at the navigator's position.
    pub(super) fn sync_focus(&mut self) {
        for tracker in self.trackers.values_mut() {
            tracker.clear_focus();
        }
        let Some(location) = self.navigator.current() else { return };
        let Some(entry) = self.entries.get(location.entry) else { return };
        if !matches!(entry.kind, EntryKind::Modified { .. }) {
            return;
        }
        if let Some(tracker) = self.trackers.get_mut(&entry.cell) {
            tracker.focus(location.offset);
        }
    }
}
