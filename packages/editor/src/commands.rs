//! # Editing Commands
//!
//! Everything that changes a document goes through a [`Command`]. Commands
//! are keyed off the current selection and are dispatched by the toolbar,
//! keyboard shortcuts and text input.
//!
//! ## Toggle semantics
//!
//! A toggle first decides whether its target is active at the selection
//! (see [`crate::FormatState`] for the uniform-range policy), then:
//!
//! - active → remove the attribute, or reset it to its default
//! - inactive → set it
//!
//! Running the same toggle twice over an unchanged selection therefore
//! restores the previous formatting.
//!
//! ### Block types
//! - Setting a block type replaces `type`, never adds to it
//! - Toggling an active type returns the blocks to `paragraph`
//! - Headings also force `bold` and a level-specific `fontSize` on every run
//!   of the block; leaving the heading removes exactly those two marks
//!
//! ### Marks
//! - With text selected, runs are split at the range edges and only the
//!   covered characters change
//! - With a collapsed caret there is nothing to format, so the toggle sets
//!   pending marks that apply to the next inserted text
//!
//! ### Alignment
//! - Only touches `align`; clearing an active alignment leaves it to
//!   normalization to restore `left`

use crate::document::{Align, Block, BlockKind, Document, HeadingLevel, Mark, Marks, Text};
use crate::format::{self, marks_at};
use crate::selection::{BlockOffset, Range, Selection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Editing commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    /// Toggle bold, italic or underline
    ToggleMark { mark: Mark },

    /// Toggle a block type (heading kinds carry the heading marks with them)
    ToggleBlock { kind: BlockKind },

    /// Toggle block alignment
    ToggleAlign { align: Align },

    /// Toggle a font family mark
    ToggleFontFamily { family: String },

    /// Toggle a font size mark
    ToggleFontSize { size: String },

    /// Set a font family mark regardless of the current value
    SetFontFamily { family: String },

    /// Set a font size mark regardless of the current value
    SetFontSize { size: String },

    /// Type text at the selection, replacing selected text
    InsertText { text: String },

    /// Backspace
    DeleteBackward,

    /// Forward delete
    DeleteForward,

    /// Remove the selected text, joining the edge blocks
    DeleteFragment,

    /// Enter: split the block at the caret
    InsertBreak,

    /// Move the selection
    Select { selection: Selection },

    /// Select the whole document
    SelectAll,

    /// Step back in history
    Undo,

    /// Step forward in history
    Redo,
}

impl Command {
    /// Shorthand for toggling a heading level.
    pub fn toggle_heading(level: HeadingLevel) -> Self {
        Command::ToggleBlock { kind: level.kind() }
    }

    /// Get a debug name for this command
    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleMark { .. } => "toggle_mark",
            Command::ToggleBlock { .. } => "toggle_block",
            Command::ToggleAlign { .. } => "toggle_align",
            Command::ToggleFontFamily { .. } => "toggle_font_family",
            Command::ToggleFontSize { .. } => "toggle_font_size",
            Command::SetFontFamily { .. } => "set_font_family",
            Command::SetFontSize { .. } => "set_font_size",
            Command::InsertText { .. } => "insert_text",
            Command::DeleteBackward => "delete_backward",
            Command::DeleteForward => "delete_forward",
            Command::DeleteFragment => "delete_fragment",
            Command::InsertBreak => "insert_break",
            Command::Select { .. } => "select",
            Command::SelectAll => "select_all",
            Command::Undo => "undo",
            Command::Redo => "redo",
        }
    }

    /// Whether the command only moves the selection.
    pub fn is_selection_only(&self) -> bool {
        matches!(self, Command::Select { .. } | Command::SelectAll)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Selection does not address the document: {0:?}")]
    InvalidSelection(Selection),

    #[error("Command requires a selection")]
    NoSelection,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Result of applying a command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Whether the document content changed
    pub changed: bool,

    /// Document version after the command
    pub version: u64,

    /// Toolbar state at the new selection
    pub format: format::FormatState,
}

/// Mutable view of the editor state a command runs against.
pub(crate) struct EditState<'a> {
    pub doc: &'a mut Document,
    pub range: Option<Range>,
    pub pending: Option<Marks>,
}

impl EditState<'_> {
    fn require_range(&self) -> Result<Range, CommandError> {
        self.range.ok_or(CommandError::NoSelection)
    }

    fn format(&self) -> format::FormatState {
        format::query(self.doc, self.range, self.pending.as_ref())
    }

    /// Marks the caret would type with.
    fn caret_marks(&self, at: BlockOffset) -> Marks {
        self.pending.clone().unwrap_or_else(|| marks_at(self.doc, at))
    }
}

/// Run a content command. Selection and history commands are handled by the
/// editor itself.
pub(crate) fn execute(command: &Command, state: &mut EditState<'_>) -> Result<(), CommandError> {
    match command {
        Command::ToggleMark { mark } => {
            let active = mark_active(&state.format(), *mark);
            update_marks(state, |marks| marks.set(*mark, !active))
        }

        Command::ToggleFontFamily { family } => {
            let active = state.format().font_family == *family;
            let family = (!active).then(|| family.clone());
            update_marks(state, move |marks| marks.font_family = family.clone())
        }

        Command::ToggleFontSize { size } => {
            let active = state.format().font_size == *size;
            let size = (!active).then(|| size.clone());
            update_marks(state, move |marks| marks.font_size = size.clone())
        }

        Command::SetFontFamily { family } => {
            update_marks(state, |marks| marks.font_family = Some(family.clone()))
        }

        Command::SetFontSize { size } => {
            update_marks(state, |marks| marks.font_size = Some(size.clone()))
        }

        Command::ToggleBlock { kind } => toggle_block(state, *kind),

        Command::ToggleAlign { align } => toggle_align(state, *align),

        Command::InsertText { text } => insert_text(state, text),

        Command::DeleteBackward => delete_backward(state),

        Command::DeleteForward => delete_forward(state),

        Command::DeleteFragment => {
            let range = state.require_range()?;
            if !range.is_collapsed() {
                let at = delete_range(state.doc, range);
                state.range = Some(Range::caret(at));
            }
            Ok(())
        }

        Command::InsertBreak => insert_break(state),

        Command::Select { .. } | Command::SelectAll | Command::Undo | Command::Redo => Ok(()),
    }
}

fn mark_active(format: &format::FormatState, mark: Mark) -> bool {
    match mark {
        Mark::Bold => format.bold,
        Mark::Italic => format.italic,
        Mark::Underline => format.underline,
    }
}

/// Apply a mark change to the selected characters, or to the pending marks
/// when the selection is collapsed.
fn update_marks<F>(state: &mut EditState<'_>, update: F) -> Result<(), CommandError>
where
    F: Fn(&mut Marks),
{
    let range = state.require_range()?;

    if range.is_collapsed() {
        let mut marks = state.caret_marks(range.start());
        update(&mut marks);
        state.pending = Some(marks);
        return Ok(());
    }

    for (b, from, to) in range.block_spans(state.doc) {
        if from == to {
            continue;
        }
        let block = &mut state.doc.blocks[b];
        let first = block.split_at(from);
        let last = block.split_at(to);
        for run in &mut block.children[first..last] {
            update(&mut run.marks);
        }
    }
    Ok(())
}

fn toggle_block(state: &mut EditState<'_>, kind: BlockKind) -> Result<(), CommandError> {
    let range = state.require_range()?;
    let blocks: Vec<usize> = range.block_spans(state.doc).into_iter().map(|(b, _, _)| b).collect();

    let active = blocks
        .iter()
        .all(|&b| state.doc.blocks[b].kind_or_default() == kind);
    let target = if active { BlockKind::Paragraph } else { kind };

    for &b in &blocks {
        let block = &mut state.doc.blocks[b];
        block.kind = Some(target);

        if let Some(level) = kind.heading_level() {
            apply_heading_marks(block, level, !active);
        }
    }

    if kind.heading_level().is_some() {
        state.pending = None;
    }
    Ok(())
}

/// Headings are bold and sized by construction.
fn apply_heading_marks(block: &mut Block, level: HeadingLevel, activate: bool) {
    for run in &mut block.children {
        if activate {
            run.marks.bold = true;
            run.marks.font_size = Some(level.font_size().to_string());
        } else {
            run.marks.bold = false;
            run.marks.font_size = None;
        }
    }
}

fn toggle_align(state: &mut EditState<'_>, align: Align) -> Result<(), CommandError> {
    let range = state.require_range()?;
    let blocks: Vec<usize> = range.block_spans(state.doc).into_iter().map(|(b, _, _)| b).collect();

    let active = blocks
        .iter()
        .all(|&b| state.doc.blocks[b].align_or_default() == align);

    for &b in &blocks {
        state.doc.blocks[b].align = if active { None } else { Some(align) };
    }
    Ok(())
}

fn insert_text(state: &mut EditState<'_>, text: &str) -> Result<(), CommandError> {
    let mut range = state.require_range()?;
    if text.is_empty() {
        return Ok(());
    }

    if !range.is_collapsed() {
        range = Range::caret(delete_range(state.doc, range));
    }

    let at = range.start();
    let pending = state.pending.take();
    let block = &mut state.doc.blocks[at.block];

    match pending {
        Some(marks) => {
            let index = block.split_at(at.offset);
            block.children.insert(index, Text::with_marks(text, marks));
        }
        None => {
            if block.children.is_empty() {
                block.children.push(Text::default());
            }
            let (inline, offset) = block.locate(at.offset);
            block.children[inline].insert_str(offset, text);
        }
    }

    let caret = BlockOffset::new(at.block, at.offset + text.chars().count());
    state.range = Some(Range::caret(caret));
    Ok(())
}

fn delete_backward(state: &mut EditState<'_>) -> Result<(), CommandError> {
    let range = state.require_range()?;
    if !range.is_collapsed() {
        let at = delete_range(state.doc, range);
        state.range = Some(Range::caret(at));
        return Ok(());
    }

    let at = range.start();
    if at.offset > 0 {
        remove_char(&mut state.doc.blocks[at.block], at.offset - 1);
        state.range = Some(Range::caret(BlockOffset::new(at.block, at.offset - 1)));
    } else if at.block > 0 {
        let joined = join_with_previous(state.doc, at.block);
        state.range = Some(Range::caret(joined));
    }
    Ok(())
}

fn delete_forward(state: &mut EditState<'_>) -> Result<(), CommandError> {
    let range = state.require_range()?;
    if !range.is_collapsed() {
        let at = delete_range(state.doc, range);
        state.range = Some(Range::caret(at));
        return Ok(());
    }

    let at = range.start();
    if at.offset < state.doc.blocks[at.block].len() {
        remove_char(&mut state.doc.blocks[at.block], at.offset);
    } else if at.block + 1 < state.doc.blocks.len() {
        join_with_previous(state.doc, at.block + 1);
    }
    Ok(())
}

fn insert_break(state: &mut EditState<'_>) -> Result<(), CommandError> {
    let mut range = state.require_range()?;
    if !range.is_collapsed() {
        range = Range::caret(delete_range(state.doc, range));
    }

    let at = range.start();
    let block = &mut state.doc.blocks[at.block];
    let index = block.split_at(at.offset);
    let mut tail = block.children.split_off(index);

    // Both halves keep a run carrying the marks at the split point.
    if tail.is_empty() {
        let marks = block.children.last().map(|run| run.marks.clone()).unwrap_or_default();
        tail.push(Text::with_marks("", marks));
    }
    if block.children.is_empty() {
        block.children.push(Text::with_marks("", tail[0].marks.clone()));
    }

    let new_block = Block {
        kind: block.kind,
        align: block.align,
        font_family: block.font_family.clone(),
        font_size: block.font_size.clone(),
        children: tail,
    };
    state.doc.blocks.insert(at.block + 1, new_block);
    state.range = Some(Range::caret(BlockOffset::new(at.block + 1, 0)));
    Ok(())
}

fn remove_char(block: &mut Block, offset: usize) {
    let index = block.split_at(offset);
    if let Some(run) = block.children[index..].iter_mut().find(|run| !run.is_empty()) {
        run.remove_char(0);
    }
}

/// Move the runs of block `index` onto the end of the previous block. The
/// previous block keeps its own attributes.
fn join_with_previous(doc: &mut Document, index: usize) -> BlockOffset {
    let removed = doc.blocks.remove(index);
    let previous = &mut doc.blocks[index - 1];
    let at = BlockOffset::new(index - 1, previous.len());
    previous.children.extend(removed.children);
    at
}

/// Delete the characters inside `range` and return the collapsed caret.
fn delete_range(doc: &mut Document, range: Range) -> BlockOffset {
    let (start, end) = (range.start(), range.end());

    if start.block == end.block {
        let block = &mut doc.blocks[start.block];
        let first = block.split_at(start.offset);
        let last = block.split_at(end.offset);
        block.children.drain(first..last);
        return start;
    }

    let tail = {
        let last = &mut doc.blocks[end.block];
        let index = last.split_at(end.offset);
        last.children.split_off(index)
    };

    let first = &mut doc.blocks[start.block];
    let index = first.split_at(start.offset);
    first.children.truncate(index);
    first.children.extend(tail);

    doc.blocks.drain(start.block + 1..=end.block);
    start
}
