//! Generation units and the skeleton/text-map artifacts.
//!
//! A generation unit is the atom of rewriting: one prompt in, one text
//! out, written back to one or more source blocks at assembly time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker fact placed first in an injected practice unit: the scenario
/// must be invented from the surrounding context rather than rewritten
/// from source sentences.
pub const FROM_CONTEXT_SENTINEL: &str = "<<FROM_CONTEXT>>";

/// Token the model returns when no plausible practice scenario exists
/// for the given facts. The driver records no text for the unit.
pub const SKIP_TOKEN: &str = "<<NO_SCENARIO>>";

/// What kind of text a unit produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Running body prose.
    Prose,
    /// Prose that folds one or more list blocks into flowing text.
    CompositeList,
    /// Practice call-out box.
    BoxPractice,
    /// Deepening call-out box.
    BoxDeepening,
}

impl UnitKind {
    /// Units whose output lands in a block's running text.
    pub fn is_body(self) -> bool {
        matches!(self, UnitKind::Prose | UnitKind::CompositeList)
    }

    /// Units whose output lands in a call-out box field.
    pub fn is_box(self) -> bool {
        matches!(self, UnitKind::BoxPractice | UnitKind::BoxDeepening)
    }
}

/// Role of a referenced source block within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRole {
    /// Receives the generated text.
    Primary,
    /// Content absorbed into the primary; emptied at assembly.
    Merged,
}

/// Reference from a unit back to a source block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRef {
    pub block_id: String,
    pub role: BlockRole,
}

impl BlockRef {
    pub fn primary(block_id: impl Into<String>) -> Self {
        Self { block_id: block_id.into(), role: BlockRole::Primary }
    }

    pub fn merged(block_id: impl Into<String>) -> Self {
        Self { block_id: block_id.into(), role: BlockRole::Merged }
    }
}

/// Where a box unit's output attaches in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    /// Block whose box field receives the text.
    pub host_block_id: String,
}

/// The atom of rewriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationUnit {
    /// Pipeline-internal id, fresh per decomposition run.
    pub unit_id: String,
    pub kind: UnitKind,
    /// Source blocks this unit covers, primary first.
    #[serde(default)]
    pub block_refs: Vec<BlockRef>,
    /// Source sentences/items the rewrite must preserve.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Planner-assigned micro-heading, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub micro_heading: Option<String>,
    /// Attachment point for box units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

impl GenerationUnit {
    pub fn new(kind: UnitKind) -> Self {
        Self {
            unit_id: Uuid::new_v4().to_string(),
            kind,
            block_refs: Vec::new(),
            facts: Vec::new(),
            micro_heading: None,
            placement: None,
        }
    }

    /// Id of the primary source block, if the unit has one.
    pub fn primary_block_id(&self) -> Option<&str> {
        self.block_refs
            .iter()
            .find(|r| r.role == BlockRole::Primary)
            .map(|r| r.block_id.as_str())
    }

    /// Total words across the unit's facts.
    pub fn word_count(&self) -> usize {
        self.facts.iter().map(|f| f.split_whitespace().count()).sum()
    }

    /// First `max_words` words of the unit's facts, for planning prompts.
    pub fn preview(&self, max_words: usize) -> String {
        self.facts
            .iter()
            .flat_map(|f| f.split_whitespace())
            .take(max_words)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True for practice units injected by the planner, whose scenario
    /// is invented rather than rewritten from existing box copy.
    pub fn is_generated_practice(&self) -> bool {
        self.kind == UnitKind::BoxPractice
            && self.facts.first().map(String::as_str) == Some(FROM_CONTEXT_SENTINEL)
    }
}

/// Per-subsection slice of the skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsectionPlan {
    pub subsection_id: String,
    pub subsection_title: String,
    #[serde(default)]
    pub units: Vec<GenerationUnit>,
}

/// Per-section slice of the skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPlan {
    pub section_id: String,
    pub section_title: String,
    #[serde(default)]
    pub subsections: Vec<SubsectionPlan>,
}

/// The decomposition artifact: every generation unit for one chapter,
/// grouped by section and subsection in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skeleton {
    pub book_id: String,
    pub chapter: u32,
    #[serde(default)]
    pub sections: Vec<SectionPlan>,
}

impl Skeleton {
    /// All units in document order.
    pub fn units(&self) -> impl Iterator<Item = &GenerationUnit> {
        self.sections
            .iter()
            .flat_map(|s| s.subsections.iter())
            .flat_map(|ss| ss.units.iter())
    }

    pub fn unit_count(&self) -> usize {
        self.units().count()
    }
}

/// The generation artifact: unit_id -> rewritten text. Keys are sorted
/// so the serialized artifact diffs cleanly between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTextMap {
    pub book_id: String,
    pub chapter: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub texts: BTreeMap<String, String>,
}

impl GeneratedTextMap {
    pub fn new(book_id: impl Into<String>, chapter: u32) -> Self {
        Self {
            book_id: book_id.into(),
            chapter,
            generated_at: Utc::now(),
            texts: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, unit_id: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(unit_id.into(), text.into());
    }

    pub fn get(&self, unit_id: &str) -> Option<&str> {
        self.texts.get(unit_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}
