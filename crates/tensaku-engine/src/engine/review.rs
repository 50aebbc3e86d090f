//! Review actions: keep/undo per entry, accept/reject everything,
//! snapshots and session-level undo/redo.
//!
//! Keep commits a cell's current state into the *other* document; undo
//! reverts the cell to the other document's state. Both dispatch on the
//! entry's variant and act in one atomic document edit. Calling either on an
//! entry that was already settled is a successful no-op.

use tensaku_diff::LineDiff;
use tensaku_types::{CellEdit, CellId, EditOrigin, TextEdit};
use tracing::{debug, error, warn};

use super::Reconciler;
use crate::entry::{DiffEntry, EntryKind, Side, shift_indices};
use crate::error::Result;
use crate::events::ReviewState;
use crate::history::Checkpoint;
use crate::snapshot::{SessionSnapshot, SnapshotBlob, SnapshotLocator};
use crate::tracker::TrackerEvent;

impl Reconciler {
    // ── Per entry ──────────────────────────────────────────────────────────

    /// Keep the entry at `index` of the ordered list. Recorded for undo.
    pub fn keep_cell(&mut self, index: usize) -> Result<bool> {
        let cell = self.entry_at(index)?.cell;
        let checkpoint = self.checkpoint();
        let applied = self.keep_entry(cell)?;
        self.record_if(checkpoint, applied);
        Ok(applied)
    }

    /// Undo the entry at `index` of the ordered list. Recorded for undo.
    pub fn undo_cell(&mut self, index: usize) -> Result<bool> {
        let cell = self.entry_at(index)?.cell;
        let checkpoint = self.checkpoint();
        let applied = self.undo_entry(cell)?;
        self.record_if(checkpoint, applied);
        Ok(applied)
    }

    /// Commit the cell's modified state into the original document.
    ///
    /// Returns `false` when there was nothing left to commit.
    pub fn keep_entry(&mut self, cell: CellId) -> Result<bool> {
        let Some(pos) = self.position_of(cell) else { return Ok(false) };
        let applied = match self.entries[pos].kind {
            EntryKind::Unchanged { .. } => false,
            EntryKind::Inserted { modified_index, .. } => self.keep_inserted(pos, cell, modified_index)?,
            EntryKind::Deleted { original_index, .. } => self.keep_deleted(pos, cell, original_index)?,
            EntryKind::Modified {
                original_index,
                modified_index,
                ..
            } => self.settle_modified(pos, cell, original_index, modified_index, Side::Original)?,
        };
        if applied {
            debug!(%cell, "kept");
            self.resort();
        }
        Ok(applied)
    }

    /// Revert the cell in the modified document to its original state.
    ///
    /// Returns `false` when there was nothing left to revert.
    pub fn undo_entry(&mut self, cell: CellId) -> Result<bool> {
        let Some(pos) = self.position_of(cell) else { return Ok(false) };
        let applied = match self.entries[pos].kind {
            EntryKind::Unchanged { .. } => false,
            EntryKind::Inserted { modified_index, .. } => self.undo_inserted(pos, cell, modified_index)?,
            EntryKind::Deleted { original_index, .. } => self.undo_deleted(pos, cell, original_index)?,
            EntryKind::Modified {
                original_index,
                modified_index,
                ..
            } => self.settle_modified(pos, cell, original_index, modified_index, Side::Modified)?,
        };
        if applied {
            debug!(%cell, "undone");
            self.resort();
        }
        Ok(applied)
    }

    fn keep_inserted(&mut self, pos: usize, cell: CellId, modified_index: usize) -> Result<bool> {
        if self.original.contains(&cell) {
            return Ok(false);
        }
        let Some(copy) = self.modified.cell(modified_index).filter(|c| c.id == cell).cloned() else {
            error!(%cell, modified_index, "inserted entry out of sync, skipping keep");
            return Ok(false);
        };

        let at = self.original_insert_position(modified_index);
        self.original.apply(vec![CellEdit::insert(at, vec![copy])], EditOrigin::Engine)?;
        shift_indices(&mut self.entries, Side::Original, at, 1);

        let seq = self.entries[pos].seq;
        self.entries[pos] = DiffEntry::unchanged(cell, at, modified_index, seq);
        self.settle_tracker(cell, TrackerEvent::Accept);
        Ok(true)
    }

    fn keep_deleted(&mut self, pos: usize, cell: CellId, original_index: usize) -> Result<bool> {
        if !self.original.cell(original_index).is_some_and(|c| c.id == cell) {
            error!(%cell, original_index, "deleted entry out of sync, skipping keep");
            return Ok(false);
        }
        self.original.apply(vec![CellEdit::delete(original_index, 1)], EditOrigin::Engine)?;
        self.entries.remove(pos);
        shift_indices(&mut self.entries, Side::Original, original_index + 1, -1);
        Ok(true)
    }

    fn undo_inserted(&mut self, pos: usize, cell: CellId, modified_index: usize) -> Result<bool> {
        if !self.modified.cell(modified_index).is_some_and(|c| c.id == cell) {
            error!(%cell, modified_index, "inserted entry out of sync, skipping undo");
            return Ok(false);
        }
        self.modified.apply(vec![CellEdit::delete(modified_index, 1)], EditOrigin::Engine)?;
        self.entries.remove(pos);
        shift_indices(&mut self.entries, Side::Modified, modified_index + 1, -1);
        self.trackers.remove(&cell);
        Ok(true)
    }

    fn undo_deleted(&mut self, pos: usize, cell: CellId, original_index: usize) -> Result<bool> {
        if self.modified.contains(&cell) {
            return Ok(false);
        }
        let Some(copy) = self.original.cell(original_index).filter(|c| c.id == cell).cloned() else {
            error!(%cell, original_index, "deleted entry out of sync, skipping undo");
            return Ok(false);
        };

        let at = self.modified_insert_position(original_index);
        self.modified.apply(vec![CellEdit::insert(at, vec![copy])], EditOrigin::Engine)?;
        shift_indices(&mut self.entries, Side::Modified, at, 1);

        let seq = self.entries[pos].seq;
        self.entries[pos] = DiffEntry::unchanged(cell, original_index, at, seq);
        Ok(true)
    }

    /// Copy one side's text of a modified cell over the other side.
    /// `target` is the document that changes.
    fn settle_modified(
        &mut self,
        pos: usize,
        cell: CellId,
        original_index: usize,
        modified_index: usize,
        target: Side,
    ) -> Result<bool> {
        let Some((original_text, modified_text)) = self.resolve_texts(pos) else {
            return Ok(false);
        };
        let (document, index, before, after, event) = match target {
            Side::Original => (&mut self.original, original_index, original_text, modified_text, TrackerEvent::Accept),
            Side::Modified => (&mut self.modified, modified_index, modified_text, original_text, TrackerEvent::Reject),
        };
        if before != after {
            let edit = CellEdit::Content {
                index,
                edits: vec![TextEdit::replace_all(&before, after)],
            };
            document.apply(vec![edit], EditOrigin::Engine)?;
        }

        let seq = self.entries[pos].seq;
        self.entries[pos] = DiffEntry::unchanged(cell, original_index, modified_index, seq);
        self.settle_tracker(cell, event);
        Ok(true)
    }

    fn settle_tracker(&mut self, cell: CellId, event: TrackerEvent) {
        if let Some(tracker) = self.trackers.get_mut(&cell) {
            tracker.handle(event);
            tracker.set_line_diff(LineDiff::identical());
        }
    }

    /// Original position for a cell kept from modified position `modified_index`:
    /// right after the last paired cell that precedes it.
    fn original_insert_position(&self, modified_index: usize) -> usize {
        self.entries
            .iter()
            .filter(|e| e.is_paired() && e.modified_index().is_some_and(|m| m < modified_index))
            .filter_map(DiffEntry::original_index)
            .max()
            .map_or(0, |o| o + 1)
    }

    /// Modified position for a cell restored from original position `original_index`.
    fn modified_insert_position(&self, original_index: usize) -> usize {
        self.entries
            .iter()
            .filter(|e| e.is_paired() && e.original_index().is_some_and(|o| o < original_index))
            .filter_map(DiffEntry::modified_index)
            .max()
            .map_or(0, |m| m + 1)
    }

    // ── Sub-cell changes ───────────────────────────────────────────────────

    /// Keep one line change of a modified cell. Recorded for undo.
    pub async fn keep_change(&mut self, cell: CellId, change: usize) -> Result<bool> {
        let checkpoint = self.checkpoint();
        let applied = self.settle_change(cell, change, Side::Original).await?;
        self.record_if(checkpoint, applied);
        Ok(applied)
    }

    /// Undo one line change of a modified cell. Recorded for undo.
    pub async fn undo_change(&mut self, cell: CellId, change: usize) -> Result<bool> {
        let checkpoint = self.checkpoint();
        let applied = self.settle_change(cell, change, Side::Modified).await?;
        self.record_if(checkpoint, applied);
        Ok(applied)
    }

    pub(super) async fn settle_change(&mut self, cell: CellId, change: usize, target: Side) -> Result<bool> {
        let Some(pos) = self.position_of(cell) else { return Ok(false) };
        let EntryKind::Modified {
            original_index,
            modified_index,
            ..
        } = self.entries[pos].kind
        else {
            return Ok(false);
        };
        let Some((original_text, modified_text)) = self.resolve_texts(pos) else {
            return Ok(false);
        };
        let Some(tracker) = self.trackers.get(&cell) else { return Ok(false) };

        let (edit, document, index) = match target {
            Side::Original => (tracker.keep_change_edit(change, &modified_text), &mut self.original, original_index),
            Side::Modified => (tracker.undo_change_edit(change, &original_text), &mut self.modified, modified_index),
        };
        let Some(edit) = edit else { return Ok(false) };
        document.apply(vec![CellEdit::Content { index, edits: vec![edit] }], EditOrigin::Engine)?;

        self.refresh_cell(cell, true).await;
        if matches!(self.entry_for(cell).map(|e| &e.kind), Some(EntryKind::Unchanged { .. })) {
            let event = match target {
                Side::Original => TrackerEvent::Accept,
                Side::Modified => TrackerEvent::Reject,
            };
            self.settle_tracker(cell, event);
        }
        self.resort();
        Ok(true)
    }

    // ── Whole session ──────────────────────────────────────────────────────

    /// Take the modified document as the new baseline.
    pub async fn accept_all(&mut self) -> Result<()> {
        self.record_history();
        self.original.replace_content(&self.modified);
        self.initial_content = self.original.content_bytes();
        self.set_state(ReviewState::Accepted);

        match self.store.save(&self.modified).await {
            Ok(()) => self.newly_created = false,
            Err(e) => warn!(error = %e, uri = %self.modified.uri(), "save after accept failed, ignoring"),
        }
        self.clear_and_recompute().await;
        Ok(())
    }

    /// Restore the modified document from the baseline. A document created
    /// by this session and never saved is deleted from the store instead.
    pub async fn reject_all(&mut self) -> Result<()> {
        self.record_history();
        self.modified.replace_content(&self.original);
        self.set_state(ReviewState::Rejected);

        let persisted = if self.newly_created {
            self.store.delete(self.modified.uri()).await
        } else {
            self.store.save(&self.modified).await
        };
        if let Err(e) = persisted {
            warn!(error = %e, uri = %self.modified.uri(), "persisting rejection failed, ignoring");
        }
        self.clear_and_recompute().await;
        Ok(())
    }

    /// Reload the modified document from its last saved state.
    pub async fn revert(&mut self) -> Result<()> {
        let saved = self.store.revert(self.modified.uri()).await?;
        self.modified.replace_content(&saved);
        self.clear_and_recompute().await;
        Ok(())
    }

    // ── Snapshots ──────────────────────────────────────────────────────────

    /// Serialize both documents and the review state.
    pub fn create_snapshot(&mut self) -> Result<SnapshotBlob> {
        self.snapshot_seq += 1;
        let locator = SnapshotLocator {
            session: self.session,
            request: self.request,
            sequence: self.snapshot_seq,
        };
        let snapshot = SessionSnapshot {
            original: self.original.clone(),
            modified: self.modified.clone(),
            state: self.state,
        };
        snapshot.encode(locator)
    }

    /// Replace the session with a snapshot's contents and rebuild the
    /// diff list. The engine adopts the snapshot's session and request ids.
    pub async fn restore_from_snapshot(&mut self, blob: &SnapshotBlob) -> Result<()> {
        let snapshot = SessionSnapshot::decode(blob)?;
        self.session = blob.locator.session;
        self.request = blob.locator.request;
        self.snapshot_seq = self.snapshot_seq.max(blob.locator.sequence);

        self.original = snapshot.original;
        self.modified = snapshot.modified;
        self.set_state(snapshot.state);
        debug!(session = %self.session, sequence = blob.locator.sequence, "restored snapshot");
        self.clear_and_recompute().await;
        Ok(())
    }

    /// Check whether the session currently holds the snapshot's content.
    pub fn equals_snapshot(&self, blob: &SnapshotBlob) -> Result<bool> {
        let snapshot = SessionSnapshot::decode(blob)?;
        Ok(snapshot.same_content(&self.original, &self.modified, self.state))
    }

    // ── Undo / redo ────────────────────────────────────────────────────────

    /// Step back to the state before the last review action.
    pub async fn undo_step(&mut self) -> bool {
        let current = self.checkpoint();
        match self.history.undo(current) {
            Some(checkpoint) => {
                self.restore_checkpoint(checkpoint).await;
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone review action.
    pub async fn redo_step(&mut self) -> bool {
        let current = self.checkpoint();
        match self.history.redo(current) {
            Some(checkpoint) => {
                self.restore_checkpoint(checkpoint).await;
                true
            }
            None => false,
        }
    }

    async fn restore_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.original = checkpoint.original;
        self.modified = checkpoint.modified;
        self.set_state(checkpoint.state);
        self.clear_and_recompute().await;
    }
}
