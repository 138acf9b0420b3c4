//! Stage 4: reassemble the rewritten chapter.
//!
//! Pure function of tree + skeleton + text map. Every unit writes to at
//! most one primary block; merged blocks are emptied and flagged;
//! headings are never touched. A handful of hygiene passes run over the
//! planned units first: re-merging a lead-in with the bare list items
//! that follow it, suppressing a redundant lead-in the rewrite made
//! obsolete, and cleaning up micro-headings that restate the
//! subsection title.

use tracing::{debug, warn};

use crate::domain::models::{
    BlockClass, BlockRole, Chapter, GeneratedTextMap, GenerationUnit, Skeleton, UnitKind,
};
use crate::services::text::{
    capitalize_first, countable_words, leading_micro_title, lowercase_first, normalize_key,
    split_sentences, strip_leading_article, strip_markers, MICRO_END, MICRO_START,
};

/// How a unit's output lands in the tree.
#[derive(Debug)]
enum Rendered {
    /// No text for this unit (skipped scenario or missing entry).
    Skip,
    /// Write this text to the unit's target.
    Write(String),
    /// The unit's content was absorbed elsewhere; empty its blocks.
    Suppress,
}

/// Assemble the rewritten chapter. The input tree is cloned; the
/// original is never mutated.
pub fn assemble_chapter(
    chapter: &Chapter,
    skeleton: &Skeleton,
    map: &GeneratedTextMap,
) -> Chapter {
    let mut out = chapter.clone();

    for section in &skeleton.sections {
        for subsection in &section.subsections {
            let rendered = render_subsection(subsection, map);
            apply_subsection(&mut out, &subsection.units, rendered);
        }
    }
    out
}

/// Compute per-unit render decisions for one subsection, applying the
/// hygiene passes over the generated texts.
fn render_subsection(
    subsection: &crate::domain::models::SubsectionPlan,
    map: &GeneratedTextMap,
) -> Vec<Rendered> {
    let units = &subsection.units;
    let mut rendered: Vec<Rendered> = units
        .iter()
        .map(|u| match map.get(&u.unit_id) {
            Some(text) => Rendered::Write(text.to_string()),
            None => Rendered::Skip,
        })
        .collect();

    remerge_split_lists(units, &mut rendered);
    fix_micro_headings(&subsection.subsection_title, &mut rendered);
    suppress_redundant_leadin(&subsection.subsection_title, &mut rendered);
    rendered
}

/// Write the render decisions back into the tree.
fn apply_subsection(chapter: &mut Chapter, units: &[GenerationUnit], rendered: Vec<Rendered>) {
    for (unit, decision) in units.iter().zip(rendered) {
        match decision {
            Rendered::Skip => {}
            Rendered::Suppress => {
                for block_ref in &unit.block_refs {
                    if let Some(block) = chapter.find_block_mut(&block_ref.block_id) {
                        block.mark_merged();
                    }
                }
            }
            Rendered::Write(text) => {
                if unit.kind.is_box() {
                    write_box(chapter, unit, text);
                } else {
                    write_body(chapter, unit, text);
                }
            }
        }
    }
}

fn write_box(chapter: &mut Chapter, unit: &GenerationUnit, text: String) {
    let Some(placement) = &unit.placement else {
        warn!(unit = %unit.unit_id, "box unit has no placement, dropping text");
        return;
    };
    let Some(host) = chapter.find_block_mut(&placement.host_block_id) else {
        warn!(unit = %unit.unit_id, host = %placement.host_block_id,
            "box placement host missing, dropping text");
        return;
    };
    if BlockClass::of(host).is_protected() {
        warn!(unit = %unit.unit_id, host = %host.id,
            "box placement targets a heading, dropping text");
        return;
    }
    match unit.kind {
        UnitKind::BoxPractice => host.practice_text = Some(text),
        UnitKind::BoxDeepening => host.deepening_text = Some(text),
        _ => {}
    }
    // A promoted unit carries block refs: its source content moved into
    // the box, so the source blocks render empty.
    if !unit.block_refs.is_empty() {
        debug!(unit = %unit.unit_id, "promoted unit, emptying source blocks");
        for block_ref in &unit.block_refs {
            if let Some(block) = chapter.find_block_mut(&block_ref.block_id) {
                block.text.clear();
                block.mark_merged();
            }
        }
    }
}

fn write_body(chapter: &mut Chapter, unit: &GenerationUnit, text: String) {
    let Some(primary_id) = unit.primary_block_id() else {
        warn!(unit = %unit.unit_id, "body unit has no primary block, dropping text");
        return;
    };
    let primary_id = primary_id.to_string();
    let merged_ids: Vec<String> = unit
        .block_refs
        .iter()
        .filter(|r| r.role == BlockRole::Merged)
        .map(|r| r.block_id.clone())
        .collect();

    let Some(block) = chapter.find_block_mut(&primary_id) else {
        warn!(unit = %unit.unit_id, block = %primary_id, "primary block missing, dropping text");
        return;
    };
    if BlockClass::of(block).is_protected() {
        warn!(unit = %unit.unit_id, block = %primary_id,
            "body unit targets a heading, dropping text");
        return;
    }
    block.text = text;
    block.items.clear();
    block.kind = crate::domain::models::BlockKind::Prose;

    for merged_id in merged_ids {
        if let Some(merged) = chapter.find_block_mut(&merged_id) {
            merged.mark_merged();
        }
    }
}

/// Hygiene pass 1: a rewritten lead-in ending in a colon (or announcing
/// items with "zoals"/"namelijk") followed by one or more bare-item
/// units gets re-merged. If the lead-in already names every item the
/// trailers are simply suppressed; otherwise the items fold into the
/// lead-in's final sentence.
fn remerge_split_lists(units: &[GenerationUnit], rendered: &mut [Rendered]) {
    let mut i = 0usize;
    while i < units.len() {
        let lead_text = match &rendered[i] {
            Rendered::Write(text) if units[i].kind.is_body() && announces_list(text) => {
                text.clone()
            }
            _ => {
                i += 1;
                continue;
            }
        };

        // Collect the run of bare-item trailers after the lead-in.
        let mut items: Vec<String> = Vec::new();
        let mut j = i + 1;
        while j < units.len() && is_bare_item_unit(&units[j]) {
            items.extend(units[j].facts.iter().cloned());
            j += 1;
        }
        if items.is_empty() {
            i += 1;
            continue;
        }

        let lead_key = normalize_key(&strip_markers(&lead_text));
        let all_named = items
            .iter()
            .all(|item| lead_key.contains(&normalize_key(item)));

        if all_named {
            debug!("lead-in already names all items, suppressing trailers");
        } else {
            let folded = fold_items_into_leadin(&lead_text, &items);
            rendered[i] = Rendered::Write(folded);
        }
        for decision in rendered.iter_mut().take(j).skip(i + 1) {
            *decision = Rendered::Suppress;
        }
        i = j;
    }
}

fn announces_list(text: &str) -> bool {
    let plain = strip_markers(text);
    let trimmed = plain.trim_end();
    if trimmed.ends_with(':') {
        return true;
    }
    let lower = trimmed.to_lowercase();
    lower.ends_with("zoals") || lower.ends_with("namelijk")
}

/// A bare-item unit is a composite-list unit whose facts are all short
/// fragments, none of which announces a list itself.
fn is_bare_item_unit(unit: &GenerationUnit) -> bool {
    unit.kind == UnitKind::CompositeList
        && !unit.facts.is_empty()
        && unit.facts.iter().all(|f| {
            f.split_whitespace().count() <= 6 && !f.trim_end().ends_with(':')
        })
}

/// Fold items into the lead-in as a comma list ending in "en".
fn fold_items_into_leadin(lead: &str, items: &[String]) -> String {
    let mut cleaned: Vec<String> = items
        .iter()
        .map(|item| {
            lowercase_first(item.trim().trim_end_matches(['.', ';', ',']))
        })
        .collect();
    let listed = match cleaned.len() {
        0 => String::new(),
        1 => cleaned.remove(0),
        _ => {
            let last = cleaned.pop().unwrap_or_default();
            format!("{} en {}", cleaned.join(", "), last)
        }
    };

    let trimmed = lead.trim_end();
    if let Some(before_colon) = trimmed.strip_suffix(':') {
        format!("{} {}.", before_colon.trim_end(), listed)
    } else {
        format!("{trimmed} {listed}.")
    }
}

/// Hygiene pass 2: strip or fix micro-headings that restate the
/// subsection title, and normalize "X van de/het Y" phrasings.
fn fix_micro_headings(subsection_title: &str, rendered: &mut [Rendered]) {
    let title_key = normalize_key(strip_leading_article(subsection_title));
    let mut first_seen = false;
    for decision in rendered.iter_mut() {
        let Rendered::Write(text) = decision else {
            continue;
        };
        let Some((micro, rest)) = leading_micro_title(text) else {
            if !first_seen && countable_words(text) > 0 {
                first_seen = true;
            }
            continue;
        };
        let is_first = !first_seen;
        first_seen = true;

        let micro_key = normalize_key(strip_leading_article(&micro));
        if is_first && (micro_key == title_key || micro_key.is_empty()) {
            // First paragraph restating the subsection title: drop the
            // marker, keep the body.
            *decision = Rendered::Write(rest);
            continue;
        }
        let fixed = fix_micro_article(&micro, subsection_title);
        if fixed != micro {
            *decision = Rendered::Write(format!("{MICRO_START}{fixed}{MICRO_END}{rest}"));
        }
    }
}

/// Micro titles never open with an article, but a possessive form like
/// "Taken van bloed" regains the article the subsection title uses
/// ("Taken van het bloed" under the title "Het bloed").
fn fix_micro_article(micro: &str, subsection_title: &str) -> String {
    let base = capitalize_first(strip_leading_article(micro.trim()));
    let stripped_title = strip_leading_article(subsection_title);
    if stripped_title == subsection_title {
        return base;
    }
    let article = subsection_title
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();
    for sep in [" van ", " of "] {
        if let Some((head, tail)) = base.split_once(sep) {
            if normalize_key(tail) == normalize_key(stripped_title) {
                return format!("{head}{sep}{article} {tail}");
            }
        }
    }
    base
}

/// Hygiene pass 3: a very short opening unit that only restates the
/// subsection title gets suppressed when the next unit reintroduces the
/// topic anyway.
fn suppress_redundant_leadin(subsection_title: &str, rendered: &mut [Rendered]) {
    let title_key = normalize_key(strip_leading_article(subsection_title));
    if title_key.is_empty() {
        return;
    }

    let mut writes = rendered
        .iter()
        .enumerate()
        .filter(|(_, r)| matches!(r, Rendered::Write(_)));
    let Some((first_idx, Rendered::Write(first_text))) = writes.next() else {
        return;
    };
    let Some((_, Rendered::Write(second_text))) = writes.next() else {
        return;
    };

    let first_plain = strip_markers(first_text);
    if countable_words(&first_plain) > 20 {
        return;
    }
    let first_key = normalize_key(strip_leading_article(&first_plain));
    if !first_key.starts_with(&title_key) {
        return;
    }
    let second_opener = split_sentences(&strip_markers(second_text))
        .into_iter()
        .next()
        .map(|s| normalize_key(strip_leading_article(&s)))
        .unwrap_or_default();
    if second_opener.starts_with(&title_key) {
        debug!("suppressing redundant lead-in paragraph");
        rendered[first_idx] = Rendered::Write(String::new());
    }
}
