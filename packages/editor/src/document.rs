//! # Document Model
//!
//! The editable tree: a document is an ordered list of blocks, each block an
//! ordered list of text runs carrying a mark set.
//!
//! ```text
//! Document
//!   ├─ Block { type: paragraph, align: left }
//!   │    ├─ Text { text: "Once upon ", }
//!   │    └─ Text { text: "a time", bold: true }
//!   └─ Block { type: heading-1, align: center }
//!        └─ Text { text: "Chapter One", bold: true, fontSize: "32px" }
//! ```
//!
//! No validation lives here. Block `type` and `align` may be absent on a tree
//! that has not been normalized yet (content loaded from the store, or an
//! alignment that was just cleared); the normalizer fills them in.
//!
//! The serialized shape is the one kept in the store under `content`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Font family reported when neither a mark nor the block sets one.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Font size reported when neither a mark nor the block sets one.
pub const DEFAULT_FONT_SIZE: &str = "11pt";

/// Structural type of a block. Toggling a block type replaces this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "heading-1")]
    Heading1,
    #[serde(rename = "heading-2")]
    Heading2,
    #[serde(rename = "bullet-list")]
    BulletList,
    #[serde(rename = "block-quote")]
    BlockQuote,
}

impl BlockKind {
    pub const ALL: [BlockKind; 5] = [
        BlockKind::Paragraph,
        BlockKind::Heading1,
        BlockKind::Heading2,
        BlockKind::BulletList,
        BlockKind::BlockQuote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading1 => "heading-1",
            BlockKind::Heading2 => "heading-2",
            BlockKind::BulletList => "bullet-list",
            BlockKind::BlockQuote => "block-quote",
        }
    }

    /// Parse the stored `type` string. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    pub fn heading_level(&self) -> Option<HeadingLevel> {
        match self {
            BlockKind::Heading1 => Some(HeadingLevel::One),
            BlockKind::Heading2 => Some(HeadingLevel::Two),
            BlockKind::Paragraph | BlockKind::BulletList | BlockKind::BlockQuote => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heading levels the toolbar offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadingLevel {
    One,
    Two,
}

impl HeadingLevel {
    pub fn kind(&self) -> BlockKind {
        match self {
            HeadingLevel::One => BlockKind::Heading1,
            HeadingLevel::Two => BlockKind::Heading2,
        }
    }

    /// The `fontSize` mark a heading forces onto its text.
    pub fn font_size(&self) -> &'static str {
        match self {
            HeadingLevel::One => "32px",
            HeadingLevel::Two => "24px",
        }
    }
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub const ALL: [Align; 4] = [Align::Left, Align::Center, Align::Right, Align::Justify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|align| align.as_str() == s)
    }
}

/// Boolean character-level marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
}

/// Character-level formatting of a text run.
///
/// Absent font attributes mean "inherit"; see [`DEFAULT_FONT_FAMILY`] and
/// [`DEFAULT_FONT_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marks {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Marks {
    pub fn get(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
        }
    }

    pub fn set(&mut self, mark: Mark, value: bool) {
        match mark {
            Mark::Bold => self.bold = value,
            Mark::Italic => self.italic = value,
            Mark::Underline => self.underline = value,
        }
    }
}

/// An inline text run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Text {
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub marks: Marks,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    /// Length in characters (Unicode scalar values), the unit of every offset.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn insert_str(&mut self, offset: usize, s: &str) {
        let at = byte_index(&self.text, offset);
        self.text.insert_str(at, s);
    }

    pub(crate) fn remove_char(&mut self, offset: usize) {
        let at = byte_index(&self.text, offset);
        if at < self.text.len() {
            self.text.remove(at);
        }
    }

    /// Split off everything from `offset` into a new run with the same marks.
    pub(crate) fn split_off(&mut self, offset: usize) -> Text {
        let at = byte_index(&self.text, offset);
        Text {
            text: self.text.split_off(at),
            marks: self.marks.clone(),
        }
    }
}

/// A top-level structural unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<BlockKind>,

    #[serde(
        default,
        deserialize_with = "lenient_align",
        skip_serializing_if = "Option::is_none"
    )]
    pub align: Option<Align>,

    /// Legacy block-level font default, kept for older stored documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,

    #[serde(default)]
    pub children: Vec<Text>,
}

impl Block {
    /// A paragraph holding one empty text run.
    pub fn empty() -> Self {
        Self::new(BlockKind::Paragraph, vec![Text::default()])
    }

    pub fn new(kind: BlockKind, children: Vec<Text>) -> Self {
        Self {
            kind: Some(kind),
            align: Some(Align::Left),
            font_family: None,
            font_size: None,
            children,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, vec![Text::new(text)])
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    /// Kind with the paragraph default applied.
    pub fn kind_or_default(&self) -> BlockKind {
        self.kind.unwrap_or(BlockKind::Paragraph)
    }

    pub fn align_or_default(&self) -> Align {
        self.align.unwrap_or_default()
    }

    /// Total length in characters across all runs.
    pub fn len(&self) -> usize {
        self.children.iter().map(Text::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.iter().all(Text::is_empty)
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.children.iter().map(|t| t.text.as_str()).collect()
    }

    /// Character offset (within the block) at which run `inline` starts.
    pub fn run_start(&self, inline: usize) -> usize {
        self.children.iter().take(inline).map(Text::len).sum()
    }

    /// Resolve a block-relative character offset to `(run index, offset in run)`.
    ///
    /// At a boundary between two runs the earlier run wins, so a caret right
    /// after bold text reports the bold run.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let mut start = 0;
        for (index, run) in self.children.iter().enumerate() {
            let end = start + run.len();
            if offset <= end {
                return (index, offset - start);
            }
            start = end;
        }
        match self.children.len() {
            0 => (0, 0),
            n => (n - 1, self.children[n - 1].len()),
        }
    }

    /// Ensure a run boundary at `offset` and return the index of the first run
    /// starting at or after it.
    pub(crate) fn split_at(&mut self, offset: usize) -> usize {
        let mut start = 0;
        for index in 0..self.children.len() {
            let len = self.children[index].len();
            if offset == start {
                return index;
            }
            if offset < start + len {
                let tail = self.children[index].split_off(offset - start);
                self.children.insert(index + 1, tail);
                return index + 1;
            }
            start += len;
        }
        self.children.len()
    }

    /// Indices of runs with at least one character inside `[from, to)`.
    pub(crate) fn runs_covering(&self, from: usize, to: usize) -> Vec<usize> {
        let mut covered = Vec::new();
        let mut start = 0;
        for (index, run) in self.children.iter().enumerate() {
            let end = start + run.len();
            if start < to && end > from {
                covered.push(index);
            }
            start = end;
        }
        covered
    }
}

/// Address of a node: a block, or an inline run inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path {
    pub block: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<usize>,
}

impl Path {
    pub fn block(block: usize) -> Self {
        Self {
            block,
            inline: None,
        }
    }

    pub fn inline(block: usize, inline: usize) -> Self {
        Self {
            block,
            inline: Some(inline),
        }
    }

    pub fn parent(&self) -> Option<Path> {
        self.inline.map(|_| Path::block(self.block))
    }
}

/// Borrowed view of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Block(&'a Block),
    Inline(&'a Text),
}

impl<'a> NodeRef<'a> {
    pub fn is_block(&self) -> bool {
        matches!(self, NodeRef::Block(_))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, NodeRef::Inline(_))
    }

    pub fn as_block(&self) -> Option<&'a Block> {
        match self {
            NodeRef::Block(block) => Some(block),
            NodeRef::Inline(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&'a Text> {
        match self {
            NodeRef::Inline(text) => Some(text),
            NodeRef::Block(_) => None,
        }
    }
}

/// Editable rich-text document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// The document a new editing session starts from: one empty paragraph.
    pub fn initial() -> Self {
        Self::new(vec![Block::empty()])
    }

    /// Build a document from a stored `content` value.
    ///
    /// Anything that is not a non-empty array of blocks, each with a non-empty
    /// `children` array, falls back to [`Document::initial`].
    pub fn from_stored(value: Option<&serde_json::Value>) -> Self {
        let Some(value) = value else {
            tracing::debug!("No stored content, starting from the initial document");
            return Self::initial();
        };

        let Some(items) = value.as_array() else {
            tracing::warn!("Stored content is not an array, starting from the initial document");
            return Self::initial();
        };

        if items.is_empty() {
            tracing::warn!("Stored content is empty, starting from the initial document");
            return Self::initial();
        }

        let shaped = items.iter().all(|node| {
            node.get("children")
                .and_then(|children| children.as_array())
                .is_some_and(|children| !children.is_empty())
        });
        if !shaped {
            tracing::warn!("Stored content has blocks without children, starting from the initial document");
            return Self::initial();
        }

        match serde_json::from_value::<Document>(value.clone()) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Stored content failed to decode, starting from the initial document");
                Self::initial()
            }
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Plain text of the document, one line per block.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get(&self, path: Path) -> Option<NodeRef<'_>> {
        let block = self.blocks.get(path.block)?;
        match path.inline {
            None => Some(NodeRef::Block(block)),
            Some(inline) => block.children.get(inline).map(NodeRef::Inline),
        }
    }

    /// Node at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the path does not address a node. Callers resolve paths
    /// against the current tree, so a miss is a bug in the caller.
    pub fn node_at(&self, path: Path) -> NodeRef<'_> {
        self.get(path)
            .unwrap_or_else(|| panic!("no node at {:?} in a document of {} blocks", path, self.blocks.len()))
    }

    /// All nodes, blocks before their runs, in document order, that satisfy
    /// `predicate`.
    pub fn nodes_matching<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = (Path, NodeRef<'a>)> + 'a
    where
        F: Fn(&NodeRef<'a>) -> bool + 'a,
    {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(b, block)| {
                std::iter::once((Path::block(b), NodeRef::Block(block))).chain(
                    block
                        .children
                        .iter()
                        .enumerate()
                        .map(move |(i, text)| (Path::inline(b, i), NodeRef::Inline(text))),
                )
            })
            .filter(move |(_, node)| predicate(node))
    }
}

/// Byte index of the `offset`-th character, clamped to the end of `s`.
pub(crate) fn byte_index(s: &str, offset: usize) -> usize {
    s.char_indices().nth(offset).map_or(s.len(), |(at, _)| at)
}

fn lenient_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BlockKind>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(BlockKind::parse))
}

fn lenient_align<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Align>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(Align::parse))
}
