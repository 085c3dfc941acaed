//! # Editor
//!
//! Owns one editing session's in-memory state: the document, the selection,
//! pending marks and undo history.
//!
//! All changes go through [`Editor::apply`]:
//!
//! ```text
//! Command → execute on a working copy → normalize → commit + record history
//! ```
//!
//! The working copy is only committed once normalization reaches a fixed
//! point. If it cannot, the editor keeps the last good document, logs the
//! failure and refuses any further command.

use crate::commands::{self, Command, CommandError, CommandOutcome, EditState};
use crate::document::{Document, Marks};
use crate::errors::EditorError;
use crate::format::{self, FormatState};
use crate::normalize::Normalizer;
use crate::selection::{self, BlockOffset, Range, Selection};
use crate::undo_stack::{Snapshot, UndoStack};

/// Single editing session over one document
#[derive(Debug)]
pub struct Editor {
    document: Document,
    selection: Option<Selection>,
    pending_marks: Option<Marks>,
    history: UndoStack,
    normalizer: Normalizer,

    /// Increments on every content change
    version: u64,

    /// Set when normalization failed; no further edits are accepted
    poisoned: bool,
}

impl Editor {
    /// Create an editor over `document` with the standard normalizer. The
    /// caret starts at the beginning of the document.
    pub fn new(document: Document) -> Result<Self, EditorError> {
        Self::with_normalizer(document, Normalizer::new())
    }

    pub fn with_normalizer(mut document: Document, normalizer: Normalizer) -> Result<Self, EditorError> {
        let report = normalizer.normalize(&mut document)?;
        if report.fixes > 0 {
            tracing::debug!(fixes = report.fixes, "Normalized document on load");
        }

        let caret = selection::to_point(&document, BlockOffset::new(0, 0));
        Ok(Self {
            document,
            selection: Some(Selection::caret(caret)),
            pending_marks: None,
            history: UndoStack::new(),
            normalizer,
            version: 0,
            poisoned: false,
        })
    }

    /// Limit undo depth (0 = unlimited).
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = UndoStack::with_max_levels(depth);
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn pending_marks(&self) -> Option<&Marks> {
        self.pending_marks.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    /// Toolbar state at the current selection.
    pub fn format(&self) -> FormatState {
        format::query(&self.document, self.range(), self.pending_marks.as_ref())
    }

    /// Stored form of the document (`content` field).
    pub fn content(&self) -> Result<serde_json::Value, EditorError> {
        Ok(self.document.to_value()?)
    }

    /// Apply a command, normalize, and record it in history.
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome, EditorError> {
        if self.poisoned {
            return Err(EditorError::Poisoned);
        }

        tracing::debug!(command = command.name(), version = self.version, "Applying command");

        match &command {
            Command::Undo => return self.step_history(true),
            Command::Redo => return self.step_history(false),
            Command::Select { selection } => {
                let range = selection::to_range(&self.document, selection)
                    .ok_or(CommandError::InvalidSelection(*selection))?;
                self.move_selection(range);
                return Ok(self.outcome(false));
            }
            Command::SelectAll => {
                let range = selection::whole_document(&self.document);
                self.move_selection(range);
                return Ok(self.outcome(false));
            }
            _ => {}
        }

        let before = self.snapshot();
        let mut working = self.document.clone();
        let mut state = EditState {
            doc: &mut working,
            range: self.range(),
            pending: self.pending_marks.clone(),
        };
        commands::execute(&command, &mut state)?;
        let (range, pending) = (state.range, state.pending);

        if let Err(e) = self.normalizer.normalize(&mut working) {
            self.poisoned = true;
            tracing::error!(
                command = command.name(),
                error = %e,
                "Document invariants could not be restored; refusing further edits"
            );
            return Err(e);
        }

        let changed = working != self.document;
        self.document = working;
        self.selection = range.map(|r| selection::to_selection(&self.document, r));
        self.pending_marks = pending;

        let typing = matches!(command, Command::InsertText { .. });
        if changed {
            self.version += 1;
            self.history.record(before, typing);
        } else if !typing {
            self.history.break_group();
        }

        Ok(self.outcome(changed))
    }

    fn step_history(&mut self, undo: bool) -> Result<CommandOutcome, EditorError> {
        let current = self.snapshot();
        let target = if undo {
            self.history.undo(current)
        } else {
            self.history.redo(current)
        };

        let Some(snapshot) = target else {
            let err = if undo {
                CommandError::NothingToUndo
            } else {
                CommandError::NothingToRedo
            };
            return Err(err.into());
        };

        self.document = snapshot.document;
        self.selection = snapshot.selection;
        self.pending_marks = None;
        self.version += 1;
        Ok(self.outcome(true))
    }

    fn move_selection(&mut self, range: Range) {
        self.selection = Some(selection::to_selection(&self.document, range));
        self.pending_marks = None;
        self.history.break_group();
    }

    fn range(&self) -> Option<Range> {
        self.selection
            .and_then(|selection| selection::to_range(&self.document, &selection))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            document: self.document.clone(),
            selection: self.selection,
        }
    }

    fn outcome(&self, changed: bool) -> CommandOutcome {
        CommandOutcome {
            changed,
            version: self.version,
            format: self.format(),
        }
    }
}
