//! # Undo/Redo Stack
//!
//! Snapshot history for the editor.
//!
//! ## Design
//!
//! - Each content-changing command records the state *before* it ran
//! - Undo restores the most recent snapshot and moves the current state to
//!   the redo stack
//! - Redo does the reverse
//! - New changes clear the redo stack
//! - Consecutive typing is grouped into one undo step; any other command, or
//!   a selection move, closes the group

use crate::document::Document;
use crate::selection::Selection;

/// Editor state captured for undo
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub document: Document,
    pub selection: Option<Selection>,
}

/// Bounded undo/redo history with typing groups
#[derive(Debug)]
pub struct UndoStack {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,

    /// Oldest steps are dropped past this depth; 0 keeps everything
    max_levels: usize,

    /// Whether the last recorded step can absorb more typing
    group_open: bool,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            group_open: false,
        }
    }

    /// Record the state before a change. `typing` changes extend an open
    /// typing group instead of starting a new step.
    pub fn record(&mut self, before: Snapshot, typing: bool) {
        self.redo_stack.clear();

        if typing && self.group_open {
            return;
        }

        self.undo_stack.push(before);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
        self.group_open = typing;
    }

    /// Close any open typing group.
    pub fn break_group(&mut self) {
        self.group_open = false;
    }

    /// Swap `current` for the previous snapshot.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        self.group_open = false;
        Some(previous)
    }

    /// Swap `current` for the next snapshot.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        self.group_open = false;
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Steps available to undo.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;

    fn snap(text: &str) -> Snapshot {
        Snapshot {
            document: Document::new(vec![Block::paragraph(text)]),
            selection: None,
        }
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut stack = UndoStack::new();
        stack.record(snap("a"), false);

        let restored = stack.undo(snap("b")).unwrap();
        assert_eq!(restored, snap("a"));
        assert!(stack.can_redo());

        let again = stack.redo(snap("a")).unwrap();
        assert_eq!(again, snap("b"));
        assert_eq!(stack.undo_count(), 1);
    }

    #[test]
    fn test_typing_is_grouped() {
        let mut stack = UndoStack::new();
        stack.record(snap(""), true);
        stack.record(snap("H"), true);
        stack.record(snap("He"), true);
        assert_eq!(stack.undo_count(), 1);

        stack.break_group();
        stack.record(snap("Hel"), true);
        assert_eq!(stack.undo_count(), 2);
    }

    #[test]
    fn test_new_change_clears_redo() {
        let mut stack = UndoStack::new();
        stack.record(snap("a"), false);
        stack.undo(snap("b"));
        stack.record(snap("a"), false);
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_max_levels() {
        let mut stack = UndoStack::with_max_levels(2);
        for text in ["a", "b", "c"] {
            stack.record(snap(text), false);
        }
        assert_eq!(stack.undo_count(), 2);
        assert_eq!(stack.undo(snap("d")), Some(snap("c")));
        assert_eq!(stack.undo(snap("c")), Some(snap("b")));
        assert_eq!(stack.undo(snap("b")), None);
    }
}
