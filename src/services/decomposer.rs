//! Stage 1: decompose a chapter tree into generation units.
//!
//! Walks each subsection's blocks in order and emits one unit per
//! rewritable region. Headings are skipped, existing call-out boxes
//! become box units anchored to themselves, and a prose block that ends
//! in a colon is fused with the list that follows it into a single
//! composite unit so the rewrite can fold the items into flowing text.

use tracing::debug;

use crate::domain::models::{
    BlockClass, BlockRef, Chapter, ContentBlock, GenerationUnit, Placement, SectionPlan, Skeleton,
    SubsectionPlan, UnitKind,
};
use crate::services::text::split_sentences;

/// Decompose a whole chapter into its skeleton.
pub fn decompose_chapter(book_id: &str, chapter: &Chapter) -> Skeleton {
    let mut sections = Vec::with_capacity(chapter.sections.len());
    for section in &chapter.sections {
        let mut subsections = Vec::with_capacity(section.subsections.len());
        for subsection in &section.subsections {
            let units = decompose_subsection(&subsection.blocks);
            debug!(
                subsection = %subsection.id,
                units = units.len(),
                "decomposed subsection"
            );
            subsections.push(SubsectionPlan {
                subsection_id: subsection.id.clone(),
                subsection_title: subsection.title.clone(),
                units,
            });
        }
        sections.push(SectionPlan {
            section_id: section.id.clone(),
            section_title: section.title.clone(),
            subsections,
        });
    }
    Skeleton { book_id: book_id.to_string(), chapter: chapter.number, sections }
}

/// Decompose one subsection's blocks into units, in document order.
pub fn decompose_subsection(blocks: &[ContentBlock]) -> Vec<GenerationUnit> {
    let flat = flatten(blocks);
    let mut units = Vec::new();
    let mut i = 0usize;

    while i < flat.len() {
        let block = flat[i];
        match BlockClass::of(block) {
            BlockClass::Heading => {
                i += 1;
            }
            BlockClass::DeepeningBox => {
                units.push(box_unit(UnitKind::BoxDeepening, block));
                i += 1;
            }
            BlockClass::PracticeBox => {
                units.push(box_unit(UnitKind::BoxPractice, block));
                i += 1;
            }
            BlockClass::Prose => {
                let fuses_next = block.text.trim_end().ends_with(':')
                    && flat
                        .get(i + 1)
                        .is_some_and(|next| {
                            matches!(BlockClass::of(next), BlockClass::List | BlockClass::Steps)
                        });
                if fuses_next {
                    let list = flat[i + 1];
                    let mut unit = GenerationUnit::new(UnitKind::CompositeList);
                    unit.block_refs =
                        vec![BlockRef::primary(&block.id), BlockRef::merged(&list.id)];
                    unit.facts.push(block.text.trim().to_string());
                    unit.facts.extend(list.items.iter().map(|s| s.trim().to_string()));
                    units.push(unit);
                    i += 2;
                } else {
                    let mut unit = GenerationUnit::new(UnitKind::Prose);
                    unit.block_refs = vec![BlockRef::primary(&block.id)];
                    unit.facts = split_sentences(&block.text);
                    units.push(unit);
                    i += 1;
                }
            }
            BlockClass::List | BlockClass::Steps => {
                // A bare list with no lead-in still becomes one unit so
                // its items get folded into prose.
                let mut unit = GenerationUnit::new(UnitKind::CompositeList);
                unit.block_refs = vec![BlockRef::primary(&block.id)];
                unit.facts = block.items.iter().map(|s| s.trim().to_string()).collect();
                units.push(unit);
                i += 1;
            }
            BlockClass::Composite => {
                // Containers were flattened away; unreachable in practice.
                i += 1;
            }
        }
    }
    units
}

/// Depth-first flatten: composite containers contribute their children
/// in place, the container itself carries no content of its own.
fn flatten(blocks: &[ContentBlock]) -> Vec<&ContentBlock> {
    let mut out = Vec::new();
    for block in blocks {
        if BlockClass::of(block) == BlockClass::Composite {
            out.extend(flatten(&block.children));
        } else {
            out.push(block);
        }
    }
    out
}

fn box_unit(kind: UnitKind, block: &ContentBlock) -> GenerationUnit {
    let mut unit = GenerationUnit::new(kind);
    unit.block_refs = vec![BlockRef::primary(&block.id)];
    unit.placement = Some(Placement { host_block_id: block.id.clone() });
    unit.facts = if block.items.is_empty() {
        split_sentences(&block.text)
    } else {
        block.items.iter().map(|s| s.trim().to_string()).collect()
    };
    unit
}
