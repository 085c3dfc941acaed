//! # StoryForge Editor
//!
//! Rich-text editing core for StoryForge documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ input: toolbar, keymap, text entry          │
//! └─────────────────────────────────────────────┘
//!                     ↓ Command
//! ┌─────────────────────────────────────────────┐
//! │ editor: apply → normalize → commit          │
//! │  - Toggle block types, marks, alignment     │
//! │  - Text input and deletion                  │
//! │  - Undo/redo history                        │
//! └─────────────────────────────────────────────┘
//!                     ↓ Document (JSON content)
//! ┌─────────────────────────────────────────────┐
//! │ storyforge-sync: debounced autosave         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Normalized after every change**: the tree always has at least one
//!    block, and every block has a type, an alignment and a text run
//! 2. **Toggles are reversible**: toggling twice over the same selection
//!    restores the previous formatting
//! 3. **Block types are exclusive**: a block is exactly one of paragraph,
//!    heading, list or quote
//! 4. **Stored form is plain JSON**: `content` round-trips through serde
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storyforge_editor::{Command, Document, Editor, Mark, Point, Selection};
//!
//! let mut editor = Editor::new(Document::initial())?;
//! editor.apply(Command::InsertText { text: "Hello".into() })?;
//!
//! let all = Selection::new(Point::new(0, 0, 0), Point::new(0, 0, 5));
//! editor.apply(Command::Select { selection: all })?;
//! let outcome = editor.apply(Command::ToggleMark { mark: Mark::Bold })?;
//! assert!(outcome.format.bold);
//!
//! let content = editor.content()?;
//! ```

mod commands;
mod document;
mod editor;
mod errors;
mod format;
mod keymap;
mod normalize;
mod selection;
mod undo_stack;

pub use commands::{Command, CommandError, CommandOutcome};
pub use document::{
    Align, Block, BlockKind, Document, HeadingLevel, Mark, Marks, NodeRef, Path, Text,
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE,
};
pub use editor::Editor;
pub use errors::EditorError;
pub use format::FormatState;
pub use keymap::{shortcut_for, KeyPress, Shortcut};
pub use normalize::{
    DefaultAlign, DefaultKind, DropEmptyRuns, EnsureChildren, LegacyBlockFont, MergeAdjacentRuns,
    NormalizeReport, NormalizeRule, Normalizer, DEFAULT_MAX_PASSES,
};
pub use selection::{Point, Selection};
pub use undo_stack::{Snapshot, UndoStack};
