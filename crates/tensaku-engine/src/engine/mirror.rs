//! Keeping the diff list in step with edits to the modified document.
//!
//! Structural changes are handled here, one [`DocumentChange`] at a time and
//! in the order they were applied:
//!
//! - splice: removed cells turn into deletions, every later index shifts,
//!   then inserted cells get entries
//! - move: modified indices are remapped, identities stay
//! - metadata, outputs, language: copied onto the original cell, never diffed
//! - content: routed to the cell's tracker; its line diff is refreshed after
//!
//! Changes the engine made itself carry [`EditOrigin::Engine`] and are
//! skipped.

use tensaku_diff::LineDiff;
use tensaku_types::{Cell, CellEdit, CellId, ChangeKind, DocumentChange, EditOrigin};
use tracing::{debug, error};

use super::Reconciler;
use crate::entry::{DiffEntry, EntryKind, Side, shift_indices};
use crate::error::Result;
use crate::events::ReviewState;
use crate::tracker::CellTracker;

impl Reconciler {
    /// Apply edits made by the person reviewing to the modified document.
    ///
    /// The edits apply atomically; on error nothing changed.
    pub async fn apply_user_edits(&mut self, edits: Vec<CellEdit>) -> Result<()> {
        let had_changes = self.navigator.total() > 0;
        let changes = self.modified.apply(edits, EditOrigin::User)?;
        self.mirror_user_edit(&changes, had_changes).await;
        Ok(())
    }

    /// Reconcile the diff list with edits already applied to the modified
    /// document.
    ///
    /// When the modified document is back to the content the session
    /// started from, the session counts as rejected and the list is
    /// rebuilt from scratch.
    async fn mirror_user_edit(&mut self, changes: &[DocumentChange], had_changes: bool) {
        if had_changes && self.modified.content_bytes() == self.initial_content {
            debug!(session = %self.session, "modified document restored by hand");
            self.set_state(ReviewState::Rejected);
            self.clear_and_recompute().await;
            return;
        }

        let refresh = self.mirror_changes(changes);
        for cell in refresh {
            self.refresh_cell(cell, false).await;
        }
        self.resort();
    }

    /// Update entries and trackers for `changes`. Returns the paired cells
    /// whose line diff needs a refresh.
    pub(super) fn mirror_changes(&mut self, changes: &[DocumentChange]) -> Vec<CellId> {
        let mut refresh = Vec::new();
        for change in changes {
            if change.origin == EditOrigin::Engine {
                continue;
            }
            match &change.kind {
                ChangeKind::Spliced {
                    start,
                    removed,
                    inserted,
                } => self.mirror_splice(*start, removed, inserted, change.origin, &mut refresh),
                ChangeKind::Moved { from, to, cells } => self.mirror_move(*from, *to, cells.len()),
                ChangeKind::Metadata { cell, .. } | ChangeKind::Outputs { cell, .. } | ChangeKind::Language { cell, .. } => {
                    self.mirror_attributes(*cell, &change.kind)
                }
                ChangeKind::DocumentMetadata => {
                    let metadata = self.modified.metadata().clone();
                    if let Err(e) = self
                        .original
                        .apply(vec![CellEdit::DocumentMetadata { metadata }], EditOrigin::Engine)
                    {
                        error!(error = %e, "failed to mirror document metadata");
                    }
                }
                ChangeKind::Content { cell, .. } => {
                    self.tracker_mut(*cell).observe(change.origin);
                    self.mirror_content(*cell);
                    if !refresh.contains(cell) {
                        refresh.push(*cell);
                    }
                }
            }
        }
        refresh
    }

    fn mirror_splice(
        &mut self,
        start: usize,
        removed: &[Cell],
        inserted: &[CellId],
        origin: EditOrigin,
        refresh: &mut Vec<CellId>,
    ) {
        // Removed cells first: paired entries become deletions, insertions vanish.
        for cell in removed {
            if self.trackers.remove(&cell.id).is_some() {
                debug!(cell = %cell.id, "disposed tracker");
            }
            refresh.retain(|c| *c != cell.id);
            let Some(pos) = self.position_of(cell.id) else { continue };
            match self.entries[pos].kind {
                EntryKind::Inserted { .. } => {
                    self.entries.remove(pos);
                }
                EntryKind::Unchanged { original_index, .. } | EntryKind::Modified { original_index, .. } => {
                    let lines = self.original.cell(original_index).map_or(0, Cell::line_count);
                    let seq = self.next_seq();
                    self.entries[pos] = DiffEntry::deleted(cell.id, original_index, lines, seq);
                }
                EntryKind::Deleted { .. } => {
                    error!(cell = %cell.id, "removed cell already tracked as deleted");
                }
            }
        }

        // Shift before creating entries for the inserted cells.
        let delta = inserted.len() as isize - removed.len() as isize;
        shift_indices(&mut self.entries, Side::Modified, start + removed.len(), delta);

        for (offset, &id) in inserted.iter().enumerate() {
            let index = start + offset;
            let Some(lines) = self.modified.cell(index).filter(|c| c.id == id).map(Cell::line_count) else {
                error!(cell = %id, index, "inserted cell not found in modified document");
                continue;
            };
            let seq = self.next_seq();

            let reinserted = self
                .position_of(id)
                .filter(|&pos| matches!(self.entries[pos].kind, EntryKind::Deleted { .. }));
            match reinserted {
                Some(pos) => {
                    // A deleted cell came back: pair it again.
                    let Some(original_index) = self.entries[pos].original_index() else { continue };
                    self.entries[pos] = DiffEntry::unchanged(id, original_index, index, seq);
                    refresh.push(id);
                }
                None => {
                    self.entries.push(DiffEntry::inserted(id, index, lines, seq));
                    let mut tracker = CellTracker::new(id, LineDiff::whole_insert(lines));
                    tracker.observe(origin);
                    self.trackers.insert(id, tracker);
                }
            }
        }
    }

    /// Remap modified indices after `length` cells moved from `from` to `to`
    /// (`to` counted after removal).
    fn mirror_move(&mut self, from: usize, to: usize, length: usize) {
        for entry in &mut self.entries {
            let Some(index) = entry.modified_index() else { continue };
            let moved = if (from..from + length).contains(&index) {
                to + (index - from)
            } else {
                let lifted = if index >= from + length { index - length } else { index };
                if lifted >= to { lifted + length } else { lifted }
            };
            entry.set_modified_index(moved);
        }
    }

    /// Copy non-content attributes of a paired cell onto its original.
    fn mirror_attributes(&mut self, cell: CellId, kind: &ChangeKind) {
        let Some(entry) = self.entry_for(cell) else { return };
        let (Some(original_index), Some(modified_index)) = (entry.original_index(), entry.modified_index()) else {
            return;
        };
        let Some(source) = self.modified.cell(modified_index) else { return };

        let edit = match kind {
            ChangeKind::Metadata { .. } => CellEdit::Metadata {
                index: original_index,
                metadata: source.metadata.clone(),
            },
            ChangeKind::Outputs { .. } => CellEdit::Outputs {
                index: original_index,
                outputs: source.outputs.clone(),
            },
            ChangeKind::Language { .. } => CellEdit::Language {
                index: original_index,
                language: source.language.clone(),
            },
            _ => return,
        };
        if let Err(e) = self.original.apply(vec![edit], EditOrigin::Engine) {
            error!(error = %e, %cell, original_index, "failed to mirror cell attributes");
        }
    }

    /// Keep the whole-cell diff of an inserted cell sized to its content.
    fn mirror_content(&mut self, cell: CellId) {
        let Some(pos) = self.position_of(cell) else { return };
        let EntryKind::Inserted { modified_index, .. } = self.entries[pos].kind else {
            return;
        };
        let lines = self.modified.cell(modified_index).map_or(0, Cell::line_count);
        let seq = self.entries[pos].seq;
        self.entries[pos] = DiffEntry::inserted(cell, modified_index, lines, seq);
        if let Some(line_diff) = self.entries[pos].line_diff().cloned() {
            self.tracker_mut(cell).set_line_diff(line_diff);
        }
    }
}

/// Cells an applied change wrote to, for rewrite-ratio estimates.
pub(super) fn touched_cells(kind: &ChangeKind) -> Vec<CellId> {
    match kind {
        ChangeKind::Spliced { inserted, removed, .. } => {
            inserted.iter().copied().chain(removed.iter().map(|c| c.id)).collect()
        }
        ChangeKind::Content { cell, .. } => vec![*cell],
        _ => Vec::new(),
    }
}
