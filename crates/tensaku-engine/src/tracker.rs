//! Per-cell review tracking.
//!
//! A [`CellTracker`] follows one cell of the modified document: who last
//! edited it, the line diff against its original counterpart, and which of
//! that diff's changes is focused for intra-cell navigation.
//!
//! ```text
//!            AgentEdit                 LastAgentEdit
//!   Clean ──────────────▶ Streaming ──────────────────▶ Clean (pending review)
//!     │                                                   │
//!     └──── UserEdit (from any state) ──▶ UserModified    ├── Accept ──▶ Accepted
//!                                                         └── Reject ──▶ Rejected
//! ```
//!
//! Accepted and Rejected ignore agent signals; only a user edit moves them on.
//! Engine-originated edits never reach the tracker as user edits because
//! every change carries its [`EditOrigin`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tensaku_diff::{LineChange, LineDiff};
use tensaku_types::{CellId, EditOrigin, TextEdit, text};

/// Review state of one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackerState {
    #[default]
    Clean,
    StreamingAgentEdit,
    UserModified,
    Accepted,
    Rejected,
}

impl TrackerState {
    /// Check if the state only leaves through a user edit.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerState::Accepted | TrackerState::Rejected)
    }
}

/// Inputs to the tracker state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerEvent {
    AgentEdit,
    LastAgentEdit,
    UserEdit,
    Accept,
    Reject,
}

/// Tracks one modified cell.
#[derive(Clone, Debug)]
pub struct CellTracker {
    cell: CellId,
    state: TrackerState,
    line_diff: LineDiff,
    cursor: Option<usize>,
}

impl CellTracker {
    pub fn new(cell: CellId, line_diff: LineDiff) -> Self {
        Self {
            cell,
            state: TrackerState::Clean,
            line_diff,
            cursor: None,
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn line_diff(&self) -> &LineDiff {
        &self.line_diff
    }

    /// Feed one event through the state machine and return the new state.
    pub fn handle(&mut self, event: TrackerEvent) -> TrackerState {
        use TrackerEvent::*;
        use TrackerState::*;

        let next = match (self.state, event) {
            (_, UserEdit) => UserModified,
            (s, AgentEdit | LastAgentEdit) if s.is_terminal() => s,
            (_, AgentEdit) => StreamingAgentEdit,
            (StreamingAgentEdit, LastAgentEdit) => Clean,
            (s, LastAgentEdit) => s,
            (_, Accept) => Accepted,
            (_, Reject) => Rejected,
        };
        if next != self.state {
            tracing::trace!(cell = %self.cell, from = %self.state, to = %next, "tracker transition");
            self.state = next;
        }
        next
    }

    /// Route an edit of this cell's buffer by origin.
    ///
    /// Engine edits are ignored. Returns the resulting state.
    pub fn observe(&mut self, origin: EditOrigin) -> TrackerState {
        match origin {
            EditOrigin::Agent => self.handle(TrackerEvent::AgentEdit),
            EditOrigin::User => self.handle(TrackerEvent::UserEdit),
            EditOrigin::Engine => self.state,
        }
    }

    /// Install a refreshed line diff, keeping the cursor in range.
    pub fn set_line_diff(&mut self, line_diff: LineDiff) {
        self.line_diff = line_diff;
        let count = self.change_count();
        self.cursor = self.cursor.filter(|_| count > 0).map(|c| c.min(count - 1));
    }

    pub fn change_count(&self) -> usize {
        self.line_diff.change_count()
    }

    // ── Intra-cell navigation ──────────────────────────────────────────────

    /// The focused change, if any.
    pub fn focused(&self) -> Option<usize> {
        self.cursor
    }

    pub fn focus(&mut self, change: usize) -> bool {
        if change < self.change_count() {
            self.cursor = Some(change);
            true
        } else {
            false
        }
    }

    pub fn clear_focus(&mut self) {
        self.cursor = None;
    }

    /// Advance to the next change. `None` once past the last one; the
    /// cursor is cleared so the caller can move on to the next cell.
    pub fn next_change(&mut self) -> Option<usize> {
        let count = self.change_count();
        let next = match self.cursor {
            None if count > 0 => Some(0),
            Some(c) if c + 1 < count => Some(c + 1),
            _ => None,
        };
        self.cursor = next;
        next
    }

    /// Step back to the previous change. `None` once before the first.
    pub fn previous_change(&mut self) -> Option<usize> {
        let count = self.change_count();
        let previous = match self.cursor {
            None if count > 0 => Some(count - 1),
            Some(c) if c > 0 => Some(c - 1),
            _ => None,
        };
        self.cursor = previous;
        previous
    }

    // ── Sub-change keep / undo ─────────────────────────────────────────────

    fn change(&self, index: usize) -> Option<&LineChange> {
        if self.line_diff.identical {
            return None;
        }
        self.line_diff.changes.get(index)
    }

    /// Edit for the *original* buffer that takes over change `index`.
    pub fn keep_change_edit(&self, index: usize, modified: &str) -> Option<TextEdit> {
        let change = self.change(index)?;
        let replacement = text::slice_lines(modified, change.modified.start, change.modified.end).ok()?;
        Some(TextEdit::replace(change.original.start, change.original.end, replacement))
    }

    /// Edit for the *modified* buffer that reverts change `index`.
    pub fn undo_change_edit(&self, index: usize, original: &str) -> Option<TextEdit> {
        let change = self.change(index)?;
        let replacement = text::slice_lines(original, change.original.start, change.original.end).ok()?;
        Some(TextEdit::replace(change.modified.start, change.modified.end, replacement))
    }
}
