//! # Normalization
//!
//! Every mutation is followed by a normalization run that repairs the tree
//! until it satisfies the structural invariants:
//!
//! - the document has at least one block
//! - every block has a `type`, an `align` and at least one text run
//!
//! ## Design
//!
//! The engine is a rewrite system. Each pass sweeps the blocks once and
//! applies at most one fix per block: the first rule, in order, that fires
//! on it. Passes repeat until a sweep changes nothing:
//!
//! 1. empty document → insert an empty paragraph
//! 2. missing `type` → `paragraph`
//! 3. missing `align` → `left`
//! 4. missing legacy block font → `Arial` / `11pt` (never overwrites)
//! 5. no children → one empty text run
//! 6. empty run next to other runs → removed
//! 7. adjacent runs with identical marks → merged
//!
//! Every fix strictly reduces the number of violations in its block, so the
//! passes needed grow with the longest block's run count, not with the
//! number of blocks. The cap is `max_passes` plus that run count; a rule set
//! that keeps firing past it is reported as
//! [`EditorError::NormalizationDiverged`] and the caller keeps its last good
//! document.
//!
//! Rules 6 and 7 never change a block's text, so block-relative caret
//! positions stay valid across normalization.

use crate::document::{Align, Block, BlockKind, Document, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};
use crate::errors::EditorError;

/// Base cap on passes per normalization run, before the allowance for long
/// blocks.
pub const DEFAULT_MAX_PASSES: usize = 1000;

/// A block-level repair.
pub trait NormalizeRule: std::fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fix one violation in `block`. Returns `true` if the block changed.
    fn repair(&self, block: &mut Block) -> bool;
}

/// Blocks without a recognised type become paragraphs.
#[derive(Debug)]
pub struct DefaultKind;

impl NormalizeRule for DefaultKind {
    fn name(&self) -> &'static str {
        "default-kind"
    }

    fn repair(&self, block: &mut Block) -> bool {
        if block.kind.is_some() {
            return false;
        }
        block.kind = Some(BlockKind::Paragraph);
        true
    }
}

/// Blocks without alignment are left-aligned.
#[derive(Debug)]
pub struct DefaultAlign;

impl NormalizeRule for DefaultAlign {
    fn name(&self) -> &'static str {
        "default-align"
    }

    fn repair(&self, block: &mut Block) -> bool {
        if block.align.is_some() {
            return false;
        }
        block.align = Some(Align::Left);
        true
    }
}

/// Block-level font defaults carried by documents written before fonts moved
/// to marks.
#[derive(Debug)]
pub struct LegacyBlockFont;

impl NormalizeRule for LegacyBlockFont {
    fn name(&self) -> &'static str {
        "legacy-block-font"
    }

    fn repair(&self, block: &mut Block) -> bool {
        if block.font_family.is_none() {
            block.font_family = Some(DEFAULT_FONT_FAMILY.to_string());
            return true;
        }
        if block.font_size.is_none() {
            block.font_size = Some(DEFAULT_FONT_SIZE.to_string());
            return true;
        }
        false
    }
}

/// Blocks always hold at least one run.
#[derive(Debug)]
pub struct EnsureChildren;

impl NormalizeRule for EnsureChildren {
    fn name(&self) -> &'static str {
        "ensure-children"
    }

    fn repair(&self, block: &mut Block) -> bool {
        if !block.children.is_empty() {
            return false;
        }
        block.children.push(Default::default());
        true
    }
}

/// An empty run is only allowed as the sole child of a block.
#[derive(Debug)]
pub struct DropEmptyRuns;

impl NormalizeRule for DropEmptyRuns {
    fn name(&self) -> &'static str {
        "drop-empty-runs"
    }

    fn repair(&self, block: &mut Block) -> bool {
        if block.children.len() < 2 {
            return false;
        }
        match block.children.iter().position(|run| run.is_empty()) {
            Some(index) => {
                block.children.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Neighbouring runs with the same marks collapse into one.
#[derive(Debug)]
pub struct MergeAdjacentRuns;

impl NormalizeRule for MergeAdjacentRuns {
    fn name(&self) -> &'static str {
        "merge-adjacent-runs"
    }

    fn repair(&self, block: &mut Block) -> bool {
        let found = block
            .children
            .windows(2)
            .position(|pair| pair[0].marks == pair[1].marks);
        match found {
            Some(index) => {
                let next = block.children.remove(index + 1);
                block.children[index].text.push_str(&next.text);
                true
            }
            None => false,
        }
    }
}

/// Outcome of a normalization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeReport {
    /// Number of fixes applied.
    pub fixes: usize,
}

/// Runs the rule set to a fixed point.
#[derive(Debug)]
pub struct Normalizer {
    rules: Vec<Box<dyn NormalizeRule>>,
    max_passes: usize,
}

impl Normalizer {
    /// Engine with the standard rules, legacy block fonts included.
    pub fn new() -> Self {
        Self::with_rules(vec![
            Box::new(DefaultKind),
            Box::new(DefaultAlign),
            Box::new(LegacyBlockFont),
            Box::new(EnsureChildren),
            Box::new(DropEmptyRuns),
            Box::new(MergeAdjacentRuns),
        ])
    }

    /// Standard rules without the legacy block-level font defaults.
    pub fn without_legacy_fonts() -> Self {
        Self::with_rules(vec![
            Box::new(DefaultKind),
            Box::new(DefaultAlign),
            Box::new(EnsureChildren),
            Box::new(DropEmptyRuns),
            Box::new(MergeAdjacentRuns),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn NormalizeRule>>) -> Self {
        Self {
            rules,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Repair `doc` in place until no rule fires.
    pub fn normalize(&self, doc: &mut Document) -> Result<NormalizeReport, EditorError> {
        let mut report = NormalizeReport::default();
        let budget = self.pass_budget(doc);

        for _ in 0..budget {
            let fixes = self.sweep(doc);
            if fixes == 0 {
                return Ok(report);
            }
            report.fixes += fixes;
        }

        // The cap was reached; one more check tells a late fixed point apart
        // from a rule set that never settles.
        if !self.would_fire(doc) {
            return Ok(report);
        }

        tracing::error!(passes = budget, "Normalization did not reach a fixed point");
        Err(EditorError::NormalizationDiverged { passes: budget })
    }

    fn pass_budget(&self, doc: &Document) -> usize {
        let longest = doc.blocks.iter().map(|block| block.children.len()).max().unwrap_or(0);
        self.max_passes.saturating_add(longest)
    }

    /// One pass: the first applicable fix on every block. Returns the number
    /// of fixes applied.
    fn sweep(&self, doc: &mut Document) -> usize {
        if doc.blocks.is_empty() {
            tracing::debug!(rule = "ensure-block", "Normalized empty document");
            doc.blocks.push(Block::empty());
            return 1;
        }

        let mut fixes = 0;
        for (index, block) in doc.blocks.iter_mut().enumerate() {
            if let Some(rule) = self.rules.iter().find(|rule| rule.repair(block)) {
                tracing::debug!(rule = rule.name(), block = index, "Normalized block");
                fixes += 1;
            }
        }
        fixes
    }

    fn would_fire(&self, doc: &Document) -> bool {
        let mut scratch = doc.clone();
        self.sweep(&mut scratch) > 0
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Marks, Text};

    #[test]
    fn test_normalizer_has_standard_rules() {
        assert_eq!(Normalizer::new().rules.len(), 6);
        assert_eq!(Normalizer::without_legacy_fonts().rules.len(), 5);
    }

    #[test]
    fn test_empty_document_gets_one_paragraph() {
        let mut doc = Document::new(vec![]);
        Normalizer::without_legacy_fonts().normalize(&mut doc).unwrap();
        assert_eq!(doc, Document::initial());
    }

    #[test]
    fn test_missing_attributes_are_filled_one_per_pass() {
        let mut doc = Document::new(vec![Block {
            kind: None,
            align: None,
            font_family: None,
            font_size: Some("14pt".to_string()),
            children: vec![],
        }]);

        let report = Normalizer::new().normalize(&mut doc).unwrap();

        let block = &doc.blocks[0];
        assert_eq!(block.kind, Some(BlockKind::Paragraph));
        assert_eq!(block.align, Some(Align::Left));
        assert_eq!(block.font_family.as_deref(), Some(DEFAULT_FONT_FAMILY));
        assert_eq!(block.font_size.as_deref(), Some("14pt"));
        assert_eq!(block.children, vec![Text::default()]);
        assert_eq!(report.fixes, 4);
    }

    #[test]
    fn test_runs_are_merged_and_empties_dropped() {
        let bold = Marks {
            bold: true,
            ..Marks::default()
        };
        let mut doc = Document::new(vec![Block::new(
            BlockKind::Paragraph,
            vec![
                Text::new("He"),
                Text::new(""),
                Text::new("llo"),
                Text::with_marks(" world", bold.clone()),
            ],
        )]);

        Normalizer::without_legacy_fonts().normalize(&mut doc).unwrap();

        assert_eq!(
            doc.blocks[0].children,
            vec![Text::new("Hello"), Text::with_marks(" world", bold)]
        );
    }

    #[test]
    fn test_normalized_document_is_a_fixed_point() {
        let mut doc = Document::initial();
        let normalizer = Normalizer::new();
        normalizer.normalize(&mut doc).unwrap();
        let report = normalizer.normalize(&mut doc).unwrap();
        assert_eq!(report.fixes, 0);
    }

    #[derive(Debug)]
    struct Flip;

    impl NormalizeRule for Flip {
        fn name(&self) -> &'static str {
            "flip"
        }

        fn repair(&self, block: &mut Block) -> bool {
            block.align = match block.align {
                Some(Align::Left) => Some(Align::Right),
                _ => Some(Align::Left),
            };
            true
        }
    }

    #[test]
    fn test_rule_that_never_settles_is_reported() {
        let normalizer = Normalizer::with_rules(vec![Box::new(Flip)]).with_max_passes(8);
        let mut doc = Document::initial();
        let err = normalizer.normalize(&mut doc).unwrap_err();
        // One run in the longest block adds one pass to the base cap.
        assert!(matches!(err, EditorError::NormalizationDiverged { passes: 9 }));
    }

    #[test]
    fn test_large_documents_settle_under_the_default_cap() {
        let blocks = (0..3000)
            .map(|i| Block {
                kind: None,
                align: None,
                font_family: None,
                font_size: None,
                children: vec![Text::new(format!("line {i}"))],
            })
            .collect();
        let mut doc = Document::new(blocks);

        let report = Normalizer::new().normalize(&mut doc).unwrap();

        assert_eq!(report.fixes, 3000 * 4);
        assert!(doc.blocks.iter().all(|block| {
            block.align == Some(Align::Left) && block.font_size.as_deref() == Some(DEFAULT_FONT_SIZE)
        }));
    }

    #[test]
    fn test_long_block_gets_a_larger_allowance() {
        let runs: Vec<Text> = (0..2500).map(|_| Text::new("a")).collect();
        let mut doc = Document::new(vec![Block::new(BlockKind::Paragraph, runs)]);

        Normalizer::without_legacy_fonts().with_max_passes(4).normalize(&mut doc).unwrap();

        assert_eq!(doc.blocks[0].children.len(), 1);
        assert_eq!(doc.blocks[0].children[0].text.len(), 2500);
    }
}
