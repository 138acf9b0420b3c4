//! Document tree model: chapters, sections, subsections, content blocks.
//!
//! This is the shape exchanged with the ingestion and rendering
//! collaborators. Block ids are stable external identifiers, unique
//! within a book; the pipeline never invents or renumbers them.

use serde::{Deserialize, Serialize};

/// Structural kind of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Prose,
    List,
    Steps,
    /// A nested sub-subsection: carries `children` blocks of its own.
    Composite,
}

/// A single content block in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Stable external identifier, unique within the book.
    pub id: String,
    pub kind: BlockKind,
    /// Running text (prose blocks).
    #[serde(default)]
    pub text: String,
    /// Ordered items (list/steps blocks).
    #[serde(default)]
    pub items: Vec<String>,
    /// Free-text origin-formatting tag; used only for classification.
    #[serde(default)]
    pub style_hint: String,
    /// Child blocks (composite blocks only).
    #[serde(default)]
    pub children: Vec<ContentBlock>,
    /// Deepening box copy attached to this block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deepening_text: Option<String>,
    /// Practice box copy attached to this block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice_text: Option<String>,
    /// Set when this block's content was absorbed into another unit and
    /// must render as empty.
    #[serde(default)]
    pub merged: bool,
}

impl ContentBlock {
    /// Create a prose block.
    pub fn prose(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BlockKind::Prose,
            text: text.into(),
            items: Vec::new(),
            style_hint: "body".to_string(),
            children: Vec::new(),
            deepening_text: None,
            practice_text: None,
            merged: false,
        }
    }

    /// Create a list block.
    pub fn list(id: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            id: id.into(),
            kind: BlockKind::List,
            text: String::new(),
            items,
            style_hint: "bullet".to_string(),
            children: Vec::new(),
            deepening_text: None,
            practice_text: None,
            merged: false,
        }
    }

    /// Override the style hint (builder style).
    pub fn with_style_hint(mut self, hint: impl Into<String>) -> Self {
        self.style_hint = hint.into();
        self
    }

    /// Empty this block's running content and flag it as merged.
    ///
    /// List/steps blocks are demoted to prose-with-empty-text so the
    /// renderer does not emit an empty list shell.
    pub fn mark_merged(&mut self) {
        self.text.clear();
        self.items.clear();
        if matches!(self.kind, BlockKind::List | BlockKind::Steps) {
            self.kind = BlockKind::Prose;
        }
        self.merged = true;
    }
}

/// Closed classification of a block, computed once at decomposition time
/// from `kind` and `style_hint`. Downstream stages branch on this enum
/// instead of re-deriving ad hoc substring checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    Prose,
    List,
    Steps,
    /// Heading or numbering block: protected, never rewritten.
    Heading,
    /// Pre-existing deepening box copy.
    DeepeningBox,
    /// Pre-existing practice box copy.
    PracticeBox,
    Composite,
}

impl BlockClass {
    /// Classify a block.
    pub fn of(block: &ContentBlock) -> Self {
        if block.kind == BlockKind::Composite {
            return BlockClass::Composite;
        }
        let hint = block.style_hint.to_lowercase();
        if is_heading_hint(&hint) {
            return BlockClass::Heading;
        }
        if hint.contains("verdieping") || hint.contains("deepening") {
            return BlockClass::DeepeningBox;
        }
        if hint.contains("praktijk") || hint.contains("practice") {
            return BlockClass::PracticeBox;
        }
        match block.kind {
            BlockKind::List => BlockClass::List,
            BlockKind::Steps => BlockClass::Steps,
            _ => BlockClass::Prose,
        }
    }

    /// Returns true for heading/numbering blocks.
    pub fn is_protected(self) -> bool {
        self == BlockClass::Heading
    }
}

/// Heading hints cover explicit tags ("heading", "title", "numbering",
/// "kop") and short h1..h6 style names.
fn is_heading_hint(hint: &str) -> bool {
    if hint.contains("heading")
        || hint.contains("title")
        || hint.contains("numbering")
        || hint.contains("kop")
    {
        return true;
    }
    let mut chars = hint.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some('h'), Some(d), None) if d.is_ascii_digit()
    )
}

/// A subsection: the decomposition scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subsection {
    pub id: String,
    /// Display number, e.g. "1.2.3".
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

/// A section grouping subsections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    /// Display number, e.g. "1.2".
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

/// A chapter: the pipeline's unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Chapter {
    /// Find a block anywhere in the chapter by id.
    pub fn find_block(&self, id: &str) -> Option<&ContentBlock> {
        for section in &self.sections {
            for subsection in &section.subsections {
                if let Some(block) = find_in_blocks(&subsection.blocks, id) {
                    return Some(block);
                }
            }
        }
        None
    }

    /// Find a block anywhere in the chapter by id, mutably.
    pub fn find_block_mut(&mut self, id: &str) -> Option<&mut ContentBlock> {
        for section in &mut self.sections {
            for subsection in &mut section.subsections {
                if let Some(block) = find_in_blocks_mut(&mut subsection.blocks, id) {
                    return Some(block);
                }
            }
        }
        None
    }
}

fn find_in_blocks<'a>(blocks: &'a [ContentBlock], id: &str) -> Option<&'a ContentBlock> {
    for block in blocks {
        if block.id == id {
            return Some(block);
        }
        if let Some(child) = find_in_blocks(&block.children, id) {
            return Some(child);
        }
    }
    None
}

fn find_in_blocks_mut<'a>(blocks: &'a mut [ContentBlock], id: &str) -> Option<&'a mut ContentBlock> {
    for block in blocks {
        if block.id == id {
            return Some(block);
        }
        if let Some(child) = find_in_blocks_mut(&mut block.children, id) {
            return Some(child);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prose() {
        let block = ContentBlock::prose("b1", "Some text.");
        assert_eq!(BlockClass::of(&block), BlockClass::Prose);
    }

    #[test]
    fn test_classify_heading_hints() {
        for hint in ["heading-2", "paragraph-title", "h3", "kop-1", "numbering"] {
            let block = ContentBlock::prose("b1", "1.2 Title").with_style_hint(hint);
            assert_eq!(BlockClass::of(&block), BlockClass::Heading, "hint {hint}");
            assert!(BlockClass::of(&block).is_protected());
        }
    }

    #[test]
    fn test_classify_boxes() {
        let deepening = ContentBlock::prose("b1", "extra").with_style_hint("box-verdieping");
        assert_eq!(BlockClass::of(&deepening), BlockClass::DeepeningBox);
        let practice = ContentBlock::prose("b2", "case").with_style_hint("box-praktijk");
        assert_eq!(BlockClass::of(&practice), BlockClass::PracticeBox);
    }

    #[test]
    fn test_classify_list_not_heading() {
        let block = ContentBlock::list("b1", vec!["a".into()]).with_style_hint("bullet-compact");
        assert_eq!(BlockClass::of(&block), BlockClass::List);
    }

    #[test]
    fn test_mark_merged_demotes_list() {
        let mut block = ContentBlock::list("b1", vec!["a".into(), "b".into()]);
        block.mark_merged();
        assert!(block.merged);
        assert!(block.items.is_empty());
        assert_eq!(block.kind, BlockKind::Prose);
    }

    #[test]
    fn test_find_block_recurses_children() {
        let mut composite = ContentBlock::prose("c1", "");
        composite.kind = BlockKind::Composite;
        composite.children = vec![ContentBlock::prose("inner", "deep text")];

        let chapter = Chapter {
            number: 1,
            title: "Cells".to_string(),
            sections: vec![Section {
                id: "s1".into(),
                number: "1.1".into(),
                title: "Basics".into(),
                subsections: vec![Subsection {
                    id: "ss1".into(),
                    number: "1.1.1".into(),
                    title: "Intro".into(),
                    blocks: vec![composite],
                }],
            }],
        };

        assert!(chapter.find_block("inner").is_some());
        assert!(chapter.find_block("missing").is_none());
    }
}
