//! Undo/redo checkpoints at the review-session boundary.
//!
//! Each review action records the state it started from. Undo and redo swap
//! whole checkpoints; the engine then clears and recomputes its diff list.

use std::collections::VecDeque;

use tensaku_types::Document;

use crate::events::ReviewState;

/// Both documents and the review state at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub original: Document,
    pub modified: Document,
    pub state: ReviewState,
}

/// Bounded undo/redo stacks.
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Checkpoint>,
    redo_stack: Vec<Checkpoint>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit,
        }
    }

    /// Record the state before an action. Clears the redo stack.
    pub fn record(&mut self, checkpoint: Checkpoint) {
        if self.limit == 0 {
            return;
        }
        self.undo_stack.push_back(checkpoint);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
    }

    /// Pop the last checkpoint, stashing `current` for redo.
    pub fn undo(&mut self, current: Checkpoint) -> Option<Checkpoint> {
        let checkpoint = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(checkpoint)
    }

    /// Pop the last undone checkpoint, stashing `current` for undo.
    pub fn redo(&mut self, current: Checkpoint) -> Option<Checkpoint> {
        let checkpoint = self.redo_stack.pop()?;
        self.undo_stack.push_back(current);
        Some(checkpoint)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensaku_types::Cell;

    fn checkpoint(source: &str) -> Checkpoint {
        Checkpoint {
            original: Document::new("mem://h", vec![]),
            modified: Document::new("mem://h", vec![Cell::code(source)]),
            state: ReviewState::Modified,
        }
    }

    #[test]
    fn test_undo_redo_swap() {
        let mut history = History::new(8);
        history.record(checkpoint("one"));
        assert!(history.can_undo());

        let restored = history.undo(checkpoint("two")).unwrap();
        assert_eq!(restored, checkpoint("one"));
        assert!(history.can_redo());

        let again = history.redo(checkpoint("one")).unwrap();
        assert_eq!(again, checkpoint("two"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_clears_redo_and_respects_limit() {
        let mut history = History::new(2);
        history.record(checkpoint("a"));
        history.record(checkpoint("b"));
        history.record(checkpoint("c"));
        history.undo(checkpoint("d"));
        history.record(checkpoint("e"));
        assert!(!history.can_redo());

        assert_eq!(history.undo(checkpoint("x")), Some(checkpoint("e")));
        assert_eq!(history.undo(checkpoint("x")), Some(checkpoint("b")));
        assert_eq!(history.undo(checkpoint("x")), None);
    }

    #[test]
    fn test_zero_limit_records_nothing() {
        let mut history = History::new(0);
        history.record(checkpoint("a"));
        assert!(!history.can_undo());
    }
}
