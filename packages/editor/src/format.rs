//! # Format Query
//!
//! Derives the toolbar state for the current selection.
//!
//! Block attributes come from the blocks the selection touches, character
//! attributes from the runs it covers. For a collapsed caret that is the run
//! just before the caret, or the pending marks when a mark was toggled with
//! nothing selected.
//!
//! Range policy: a flag reads `true` only when it holds for every covered run
//! (or every touched block). Font family and size report the value at the
//! start of the range. Every field resolves to a concrete value.

use crate::document::{Align, Block, BlockKind, Document, Marks, Text, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};
use crate::selection::{BlockOffset, Range};
use serde::{Deserialize, Serialize};

/// Toolbar state at the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub align: Align,
    pub font_family: String,
    pub font_size: String,
    pub is_list: bool,
    pub is_heading1: bool,
    pub is_heading2: bool,
    pub is_block_quote: bool,
}

impl Default for FormatState {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            align: Align::Left,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE.to_string(),
            is_list: false,
            is_heading1: false,
            is_heading2: false,
            is_block_quote: false,
        }
    }
}

pub(crate) fn query(doc: &Document, range: Option<Range>, pending: Option<&Marks>) -> FormatState {
    let Some(range) = range else {
        return FormatState::default();
    };

    let blocks: Vec<&Block> = range
        .block_spans(doc)
        .into_iter()
        .map(|(b, _, _)| &doc.blocks[b])
        .collect();
    let Some(first) = blocks.first() else {
        return FormatState::default();
    };

    let every = |kind: BlockKind| blocks.iter().all(|block| block.kind_or_default() == kind);
    let mut state = FormatState {
        align: if blocks.iter().all(|b| b.align_or_default() == first.align_or_default()) {
            first.align_or_default()
        } else {
            Align::Left
        },
        is_list: every(BlockKind::BulletList),
        is_heading1: every(BlockKind::Heading1),
        is_heading2: every(BlockKind::Heading2),
        is_block_quote: every(BlockKind::BlockQuote),
        ..FormatState::default()
    };

    let runs = if range.is_collapsed() {
        Vec::new()
    } else {
        covered_runs(doc, range)
    };

    match runs.first() {
        Some((block, run)) => {
            state.bold = runs.iter().all(|(_, r)| r.marks.bold);
            state.italic = runs.iter().all(|(_, r)| r.marks.italic);
            state.underline = runs.iter().all(|(_, r)| r.marks.underline);
            state.font_family = effective_family(block, &run.marks);
            state.font_size = effective_size(block, &run.marks);
        }
        None => {
            let start = range.start();
            let block = &doc.blocks[start.block.min(doc.blocks.len() - 1)];
            let marks = match pending {
                Some(marks) if range.is_collapsed() => marks.clone(),
                _ => marks_at(doc, start),
            };
            state.bold = marks.bold;
            state.italic = marks.italic;
            state.underline = marks.underline;
            state.font_family = effective_family(block, &marks);
            state.font_size = effective_size(block, &marks);
        }
    }

    state
}

/// Marks of the run a caret at `at` types into.
pub(crate) fn marks_at(doc: &Document, at: BlockOffset) -> Marks {
    doc.blocks
        .get(at.block)
        .and_then(|block| {
            let (inline, _) = block.locate(at.offset);
            block.children.get(inline)
        })
        .map(|run| run.marks.clone())
        .unwrap_or_default()
}

/// Non-empty runs with at least one character inside the range.
pub(crate) fn covered_runs(doc: &Document, range: Range) -> Vec<(&Block, &Text)> {
    range
        .block_spans(doc)
        .into_iter()
        .flat_map(|(b, from, to)| {
            let block = &doc.blocks[b];
            block
                .runs_covering(from, to)
                .into_iter()
                .map(move |i| (block, &block.children[i]))
        })
        .collect()
}

fn effective_family(block: &Block, marks: &Marks) -> String {
    marks
        .font_family
        .as_deref()
        .or(block.font_family.as_deref())
        .unwrap_or(DEFAULT_FONT_FAMILY)
        .to_string()
}

fn effective_size(block: &Block, marks: &Marks) -> String {
    marks
        .font_size
        .as_deref()
        .or(block.font_size.as_deref())
        .unwrap_or(DEFAULT_FONT_SIZE)
        .to_string()
}
