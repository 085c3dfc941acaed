//! Selections and the block-relative positions commands work with.
//!
//! A [`Selection`] is what callers see: anchor and focus points addressing an
//! inline run plus a character offset into it. Commands split and merge runs,
//! which moves run indices around, so internally every point is converted to a
//! [`BlockOffset`] (block index + character offset within the whole block).
//! Those survive run splits and merges unchanged and are resolved back to
//! points once the tree is normalized.

use crate::document::{Document, Path};
use serde::{Deserialize, Serialize};

/// A caret position: run address plus character offset into the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub block: usize,
    pub inline: usize,
    pub offset: usize,
}

impl Point {
    pub fn new(block: usize, inline: usize, offset: usize) -> Self {
        Self {
            block,
            inline,
            offset,
        }
    }

    pub fn path(&self) -> Path {
        Path::inline(self.block, self.inline)
    }
}

/// Anchor/focus range. Collapsed when both points are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn start(&self) -> Point {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> Point {
        self.anchor.max(self.focus)
    }
}

/// Position expressed as a character offset within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BlockOffset {
    pub block: usize,
    pub offset: usize,
}

impl BlockOffset {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// Block-relative anchor/focus pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Range {
    pub anchor: BlockOffset,
    pub focus: BlockOffset,
}

impl Range {
    pub fn caret(at: BlockOffset) -> Self {
        Self {
            anchor: at,
            focus: at,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn start(&self) -> BlockOffset {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> BlockOffset {
        self.anchor.max(self.focus)
    }

    /// Every block the range touches, with the `[from, to)` character span
    /// it covers inside that block.
    pub fn block_spans(&self, doc: &Document) -> Vec<(usize, usize, usize)> {
        let (start, end) = (self.start(), self.end());
        (start.block..=end.block.min(doc.blocks.len().saturating_sub(1)))
            .filter_map(|b| {
                let block = doc.blocks.get(b)?;
                let from = if b == start.block { start.offset } else { 0 };
                let to = if b == end.block { end.offset } else { block.len() };
                Some((b, from.min(block.len()), to.min(block.len())))
            })
            .collect()
    }
}

/// Convert a caller-supplied point, rejecting paths and offsets that do not
/// exist in `doc`.
pub(crate) fn to_block_offset(doc: &Document, point: Point) -> Option<BlockOffset> {
    let block = doc.blocks.get(point.block)?;
    let run = block.children.get(point.inline)?;
    if point.offset > run.len() {
        return None;
    }
    Some(BlockOffset::new(point.block, block.run_start(point.inline) + point.offset))
}

pub(crate) fn to_range(doc: &Document, selection: &Selection) -> Option<Range> {
    Some(Range {
        anchor: to_block_offset(doc, selection.anchor)?,
        focus: to_block_offset(doc, selection.focus)?,
    })
}

/// Resolve a block-relative position back to a point, clamping to the tree.
pub(crate) fn to_point(doc: &Document, at: BlockOffset) -> Point {
    let Some(last) = doc.blocks.len().checked_sub(1) else {
        return Point::new(0, 0, 0);
    };
    let block_index = at.block.min(last);
    let block = &doc.blocks[block_index];
    let offset = if block_index == at.block {
        at.offset.min(block.len())
    } else {
        block.len()
    };
    let (inline, inner) = block.locate(offset);
    Point::new(block_index, inline, inner)
}

pub(crate) fn to_selection(doc: &Document, range: Range) -> Selection {
    Selection::new(to_point(doc, range.anchor), to_point(doc, range.focus))
}

/// Range covering the whole document.
pub(crate) fn whole_document(doc: &Document) -> Range {
    let last = doc.blocks.len().saturating_sub(1);
    let end = doc.blocks.get(last).map_or(0, |block| block.len());
    Range {
        anchor: BlockOffset::new(0, 0),
        focus: BlockOffset::new(last, end),
    }
}
