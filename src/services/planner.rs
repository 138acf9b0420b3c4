//! Stage 2: layout planning over the skeleton.
//!
//! Three passes per section, all mutating the skeleton in place:
//!
//! 1. Micro-headings: long body units get a short scannable title,
//!    proposed by the layout advisor and validated locally.
//! 2. Deepening promotion: a bounded share of the section's longest,
//!    densest body units move out of the running text into deepening
//!    boxes anchored at their own position.
//! 3. Practice injection: every subsection with body content and no
//!    existing practice box gets one invented-scenario practice unit.
//!
//! Advisor failures degrade to local heuristics; planning never fails
//! a run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::domain::models::{
    GenerationUnit, Placement, PlannerConfig, SectionPlan, Skeleton, UnitKind,
    FROM_CONTEXT_SENTINEL,
};
use crate::domain::ports::{LayoutAdvisor, PlanAdvice, PlanCandidate, PlanRequest};
use crate::services::text::{leading_noun_phrase, normalize_key, strip_leading_article};

const PREVIEW_WORDS: usize = 12;

/// Drives the planning passes against a layout advisor.
pub struct LayoutPlanner<'a> {
    advisor: &'a dyn LayoutAdvisor,
    config: &'a PlannerConfig,
}

impl<'a> LayoutPlanner<'a> {
    pub fn new(advisor: &'a dyn LayoutAdvisor, config: &'a PlannerConfig) -> Self {
        Self { advisor, config }
    }

    /// Run all planning passes over the skeleton.
    pub async fn plan(&self, skeleton: &mut Skeleton) {
        for section in &mut skeleton.sections {
            self.plan_section(section).await;
        }
        for section in &mut skeleton.sections {
            for subsection in &mut section.subsections {
                self.inject_practice(subsection);
            }
        }
    }

    async fn plan_section(&self, section: &mut SectionPlan) {
        let scope: Vec<&GenerationUnit> = section
            .subsections
            .iter()
            .flat_map(|ss| ss.units.iter())
            .filter(|u| u.kind.is_body())
            .collect();
        if scope.is_empty() {
            return;
        }

        // Micro-heading candidates sit above both the scope mean and a
        // fixed floor, so trivial units stay untagged even in a short
        // section.
        let mean_words =
            scope.iter().map(|u| u.word_count()).sum::<usize>() / scope.len();
        let heading_units: Vec<&GenerationUnit> = scope
            .iter()
            .filter(|u| {
                u.word_count() >= mean_words
                    && u.word_count() >= self.config.micro_heading_floor
            })
            .copied()
            .collect();
        let heading_candidates: Vec<PlanCandidate> =
            heading_units.iter().map(|u| candidate(u)).collect();
        let deepening_candidates: Vec<PlanCandidate> = scope
            .iter()
            .filter(|u| u.word_count() >= self.config.deepening_floor)
            .map(|u| candidate(u))
            .collect();

        let advice = if heading_candidates.is_empty() && deepening_candidates.is_empty() {
            PlanAdvice::default()
        } else {
            let request = PlanRequest {
                section_title: section.section_title.clone(),
                heading_candidates,
                deepening_candidates: deepening_candidates.clone(),
            };
            match self.advisor.plan(request).await {
                Ok(advice) => advice,
                Err(err) => {
                    warn!(section = %section.section_id, error = %err,
                        "layout advisor failed, falling back to local heuristics");
                    PlanAdvice::default()
                }
            }
        };

        let promoted = self.select_promotions(&scope, &deepening_candidates, &advice);
        let headings = validated_headings(section, &heading_units, &promoted, &advice);

        debug!(
            section = %section.section_id,
            promoted = promoted.len(),
            headings = headings.len(),
            "section planned"
        );

        for subsection in &mut section.subsections {
            for unit in &mut subsection.units {
                if promoted.contains(&unit.unit_id) {
                    unit.kind = UnitKind::BoxDeepening;
                    unit.micro_heading = None;
                    if let Some(primary) = unit.primary_block_id() {
                        unit.placement = Some(Placement { host_block_id: primary.to_string() });
                    }
                } else if let Some(title) = headings.get(&unit.unit_id) {
                    unit.micro_heading = Some(title.clone());
                }
            }
        }
    }

    /// Decide which candidates get promoted, honoring the clamp band:
    /// at least max(base, ceil(min_pct * n)), at most
    /// min(floor(max_pct * n), hard_cap), with max raised to min when
    /// the band would invert on tiny sections. Advisor picks come
    /// first; local scoring tops up to the minimum, preferring
    /// non-adjacent picks and skipping the protected lead units.
    fn select_promotions(
        &self,
        scope: &[&GenerationUnit],
        candidates: &[PlanCandidate],
        advice: &PlanAdvice,
    ) -> HashSet<String> {
        if candidates.is_empty() {
            return HashSet::new();
        }
        let n = candidates.len();
        let min_count = self
            .config
            .promotion_min_base
            .max((self.config.promotion_min_pct * n as f64).ceil() as usize)
            .min(n);
        let mut max_count = ((self.config.promotion_max_pct * n as f64).floor() as usize)
            .min(self.config.promotion_hard_cap);
        if max_count < min_count {
            max_count = min_count;
        }

        let candidate_ids: HashSet<&str> =
            candidates.iter().map(|c| c.unit_id.as_str()).collect();
        let position: HashMap<&str, usize> = scope
            .iter()
            .enumerate()
            .map(|(i, u)| (u.unit_id.as_str(), i))
            .collect();
        let protected: HashSet<&str> = scope
            .iter()
            .take(self.config.protected_lead_units)
            .map(|u| u.unit_id.as_str())
            .collect();

        let mut scored: Vec<(&str, f64)> = candidates
            .iter()
            .filter(|c| !protected.contains(c.unit_id.as_str()))
            .filter_map(|c| {
                scope
                    .iter()
                    .find(|u| u.unit_id == c.unit_id)
                    .map(|u| (c.unit_id.as_str(), complexity_score(&u.facts.join(" "))))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        // Advisor picks first, filtered to real candidates outside the
        // protected lead.
        let mut selected: Vec<&str> = Vec::new();
        for id in &advice.promoted_unit_ids {
            if candidate_ids.contains(id.as_str())
                && !protected.contains(id.as_str())
                && !selected.contains(&id.as_str())
            {
                selected.push(id.as_str());
            }
        }

        // Over-selection: keep only the highest-scoring advisor picks.
        if selected.len() > max_count {
            selected.sort_by(|a, b| {
                let score = |id: &&str| {
                    scored
                        .iter()
                        .find(|(sid, _)| sid == id)
                        .map(|(_, s)| *s)
                        .unwrap_or(0.0)
                };
                score(b).total_cmp(&score(a))
            });
            selected.truncate(max_count);
        }

        // Top up to the minimum, first avoiding adjacency with anything
        // already selected, then relaxing adjacency if still short.
        for relax_adjacency in [false, true] {
            if selected.len() >= min_count {
                break;
            }
            for &(id, _) in &scored {
                if selected.len() >= min_count {
                    break;
                }
                if selected.contains(&id) {
                    continue;
                }
                if !relax_adjacency && is_adjacent(id, &selected, &position) {
                    continue;
                }
                selected.push(id);
            }
        }

        selected.into_iter().map(String::from).collect()
    }

    /// Append one invented-scenario practice unit to a subsection that
    /// has body content and no practice box yet. The unit anchors to
    /// the last body unit's primary block and carries a few of that
    /// unit's facts so the scenario stays on topic.
    fn inject_practice(&self, subsection: &mut crate::domain::models::SubsectionPlan) {
        let has_practice = subsection
            .units
            .iter()
            .any(|u| u.kind == UnitKind::BoxPractice);
        let last_body = subsection.units.iter().rev().find(|u| u.kind.is_body());
        let Some(anchor) = last_body else {
            return;
        };
        if has_practice {
            return;
        }

        // Context facts come from the anchor unit itself, so the
        // invented scenario talks about the content it sits next to.
        let mut facts = vec![FROM_CONTEXT_SENTINEL.to_string()];
        facts.extend(anchor.facts.iter().take(self.config.context_facts).cloned());

        let mut unit = GenerationUnit::new(UnitKind::BoxPractice);
        unit.facts = facts;
        unit.placement = anchor
            .primary_block_id()
            .map(|id| Placement { host_block_id: id.to_string() });
        debug!(subsection = %subsection.subsection_id, "practice unit injected");
        subsection.units.push(unit);
    }
}

/// Title every heading candidate that was not promoted: the advisor's
/// proposal when it does not restate the subsection title, otherwise a
/// deterministic noun-phrase fallback from the unit's own opening. A
/// fallback that restates the title is dropped rather than applied.
fn validated_headings(
    section: &SectionPlan,
    heading_units: &[&GenerationUnit],
    promoted: &HashSet<String>,
    advice: &PlanAdvice,
) -> HashMap<String, String> {
    let subsection_of: HashMap<&str, &str> = section
        .subsections
        .iter()
        .flat_map(|ss| {
            ss.units
                .iter()
                .map(move |u| (u.unit_id.as_str(), ss.subsection_title.as_str()))
        })
        .collect();

    let mut out = HashMap::new();
    for unit in heading_units {
        if promoted.contains(&unit.unit_id) {
            continue;
        }
        let subsection_title =
            subsection_of.get(unit.unit_id.as_str()).copied().unwrap_or("");
        let proposed = advice
            .micro_headings
            .get(&unit.unit_id)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty() && !title_restates(t, subsection_title));
        let title = match proposed {
            Some(title) => Some(title.to_string()),
            None => leading_noun_phrase(&unit.facts.join(" "))
                .filter(|t| !title_restates(t, subsection_title)),
        };
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            out.insert(unit.unit_id.clone(), title);
        }
    }
    out
}

fn candidate(unit: &GenerationUnit) -> PlanCandidate {
    PlanCandidate {
        unit_id: unit.unit_id.clone(),
        preview: unit.preview(PREVIEW_WORDS),
        word_count: unit.word_count(),
    }
}

fn is_adjacent(id: &str, selected: &[&str], position: &HashMap<&str, usize>) -> bool {
    let Some(&pos) = position.get(id) else {
        return false;
    };
    selected.iter().any(|s| {
        position
            .get(s)
            .is_some_and(|&p| p.abs_diff(pos) == 1)
    })
}

/// Crude density score: length plus the share of digits, symbols, and
/// long technical tokens. Used to rank promotion candidates locally.
fn complexity_score(text: &str) -> f64 {
    let chars = text.chars().count().max(1) as f64;
    let words: Vec<&str> = text.split_whitespace().collect();
    let word_count = words.len().max(1) as f64;
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count() as f64;
    let symbols = text
        .chars()
        .filter(|c| matches!(c, '%' | '°' | '/' | '=' | '+' | '<' | '>'))
        .count() as f64;
    let long_tokens = words.iter().filter(|w| w.chars().count() >= 12).count() as f64;

    word_count / 60.0 + (digits / chars) * 10.0 + (symbols / chars) * 14.0
        + (long_tokens / word_count) * 4.0
}

/// A proposed title restates the subsection title if its normalized,
/// article-stripped form equals or prefixes the subsection's.
fn title_restates(proposed: &str, subsection_title: &str) -> bool {
    if subsection_title.is_empty() {
        return false;
    }
    let proposed_key = normalize_key(strip_leading_article(proposed));
    let title_key = normalize_key(strip_leading_article(subsection_title));
    if proposed_key.is_empty() {
        return true;
    }
    proposed_key == title_key
        || proposed_key.starts_with(&format!("{title_key} "))
        || title_key.starts_with(&format!("{proposed_key} "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BlockRef, SectionPlan, SubsectionPlan};
    use crate::domain::ports::PlanAdvice;
    use crate::infrastructure::mock::MockAdvisor;

    fn unit_with_words(id_hint: &str, words: usize) -> GenerationUnit {
        let mut unit = GenerationUnit::new(UnitKind::Prose);
        unit.block_refs = vec![BlockRef::primary(format!("blk-{id_hint}"))];
        let sentence: String = (0..words).map(|i| format!("woord{i} ")).collect();
        unit.facts = vec![format!("{}.", sentence.trim())];
        unit
    }

    fn skeleton_with(units: Vec<GenerationUnit>) -> Skeleton {
        Skeleton {
            book_id: "bio-7".into(),
            chapter: 1,
            sections: vec![SectionPlan {
                section_id: "s1".into(),
                section_title: "Het bloed".into(),
                subsections: vec![SubsectionPlan {
                    subsection_id: "ss1".into(),
                    subsection_title: "Samenstelling".into(),
                    units,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_promotion_meets_minimum_on_small_sections() {
        // Two long candidates after twenty short units: the clamp band
        // inverts (floor(0.14 * 2) = 0 < 2) and must be widened so the
        // minimum of two promotions still lands.
        let mut units: Vec<GenerationUnit> =
            (0..20).map(|i| unit_with_words(&format!("s{i}"), 8)).collect();
        units.push(unit_with_words("long-a", 200));
        units.push(unit_with_words("long-b", 200));
        let mut skeleton = skeleton_with(units);

        let advisor = MockAdvisor::with_advice(PlanAdvice::default());
        let config = PlannerConfig::default();
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        let promoted: Vec<_> = skeleton
            .units()
            .filter(|u| u.kind == UnitKind::BoxDeepening)
            .collect();
        assert_eq!(promoted.len(), 2);
        for unit in &promoted {
            assert!(unit.placement.is_some());
            assert!(unit.micro_heading.is_none());
        }
    }

    #[tokio::test]
    async fn test_protected_lead_units_never_promoted() {
        let units: Vec<GenerationUnit> =
            (0..6).map(|i| unit_with_words(&format!("u{i}"), 120)).collect();
        let lead_ids: Vec<String> =
            units.iter().take(2).map(|u| u.unit_id.clone()).collect();
        let mut skeleton = skeleton_with(units);

        let advisor = MockAdvisor::with_advice(PlanAdvice {
            micro_headings: HashMap::new(),
            promoted_unit_ids: lead_ids.clone(),
        });
        let config = PlannerConfig::default();
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        for unit in skeleton.units() {
            if lead_ids.contains(&unit.unit_id) {
                assert_ne!(unit.kind, UnitKind::BoxDeepening);
            }
        }
    }

    #[tokio::test]
    async fn test_advisor_failure_degrades_to_heuristics() {
        let mut units: Vec<GenerationUnit> =
            (0..10).map(|i| unit_with_words(&format!("u{i}"), 10)).collect();
        units.push(unit_with_words("long-a", 150));
        units.push(unit_with_words("long-b", 150));
        units.push(unit_with_words("long-c", 150));
        let mut skeleton = skeleton_with(units);

        let advisor = MockAdvisor::failing();
        let config = PlannerConfig::default();
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        let promoted = skeleton
            .units()
            .filter(|u| u.kind == UnitKind::BoxDeepening)
            .count();
        assert!(promoted >= 2, "local top-up must still meet the minimum");
    }

    #[tokio::test]
    async fn test_restating_title_replaced_by_fallback() {
        let mut unit = unit_with_words("u0", 60);
        unit.facts =
            vec!["De rode bloedcellen vervoeren zuurstof door het hele lichaam.".to_string()];
        let unit_id = unit.unit_id.clone();
        let mut skeleton = skeleton_with(vec![unit]);

        let mut headings = HashMap::new();
        headings.insert(unit_id.clone(), "De samenstelling".to_string());
        let advisor =
            MockAdvisor::with_advice(PlanAdvice { micro_headings: headings, promoted_unit_ids: vec![] });
        let config = PlannerConfig { micro_heading_floor: 5, ..PlannerConfig::default() };
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        let unit = skeleton.units().find(|u| u.unit_id == unit_id).expect("unit");
        let heading = unit.micro_heading.as_deref().expect("fallback heading");
        assert_ne!(normalize_key(heading), "samenstelling");
        assert!(heading.starts_with("Rode bloedcellen"));
    }

    #[tokio::test]
    async fn test_candidate_without_advisor_title_gets_fallback() {
        let short = unit_with_words("short", 10);
        let long = unit_with_words("long", 60);
        let short_id = short.unit_id.clone();
        let long_id = long.unit_id.clone();
        let mut skeleton = skeleton_with(vec![short, long]);

        let advisor = MockAdvisor::empty();
        let config = PlannerConfig::default();
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        let long = skeleton.units().find(|u| u.unit_id == long_id).expect("unit");
        assert!(long.micro_heading.is_some(), "candidate must never stay untitled");
        // Below the scope mean: not a candidate, no heading.
        let short = skeleton.units().find(|u| u.unit_id == short_id).expect("unit");
        assert!(short.micro_heading.is_none());
    }

    #[tokio::test]
    async fn test_practice_injected_once_per_subsection() {
        let mut skeleton = skeleton_with(vec![unit_with_words("u0", 30)]);
        let advisor = MockAdvisor::with_advice(PlanAdvice::default());
        let config = PlannerConfig::default();
        let planner = LayoutPlanner::new(&advisor, &config);
        planner.plan(&mut skeleton).await;

        let practice: Vec<_> = skeleton
            .units()
            .filter(|u| u.kind == UnitKind::BoxPractice)
            .collect();
        assert_eq!(practice.len(), 1);
        assert!(practice[0].is_generated_practice());
        assert_eq!(
            practice[0].placement.as_ref().map(|p| p.host_block_id.as_str()),
            Some("blk-u0")
        );

        // Re-planning must not inject a second one.
        planner.plan(&mut skeleton).await;
        let count = skeleton
            .units()
            .filter(|u| u.kind == UnitKind::BoxPractice)
            .count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_fallback_title_restating_subsection_dropped() {
        let mut unit = GenerationUnit::new(UnitKind::Prose);
        unit.block_refs = vec![BlockRef::primary("blk-u0")];
        unit.facts =
            vec!["De samenstelling van het bloed verandert bij ziekte en inspanning.".to_string()];
        let unit_id = unit.unit_id.clone();
        let mut skeleton = skeleton_with(vec![unit]);

        let advisor = MockAdvisor::empty();
        let config = PlannerConfig { micro_heading_floor: 5, ..PlannerConfig::default() };
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        let unit = skeleton.units().find(|u| u.unit_id == unit_id).expect("unit");
        assert!(unit.micro_heading.is_none(), "restating fallback must be dropped");
    }

    #[tokio::test]
    async fn test_practice_facts_drawn_from_anchor_unit() {
        let mut first = GenerationUnit::new(UnitKind::Prose);
        first.block_refs = vec![BlockRef::primary("blk-eerste")];
        first.facts = vec!["Plasma is vloeibaar.".into(), "Plasma bevat water.".into()];
        let mut anchor = GenerationUnit::new(UnitKind::Prose);
        anchor.block_refs = vec![BlockRef::primary("blk-anker")];
        anchor.facts = vec!["Bloedplaatjes stelpen wonden.".into(), "Ze klonteren samen.".into()];
        let mut skeleton = skeleton_with(vec![first, anchor]);

        let advisor = MockAdvisor::empty();
        let config = PlannerConfig::default();
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;

        let practice = skeleton
            .units()
            .find(|u| u.kind == UnitKind::BoxPractice)
            .expect("practice unit");
        assert_eq!(
            practice.placement.as_ref().map(|p| p.host_block_id.as_str()),
            Some("blk-anker")
        );
        assert_eq!(
            practice.facts,
            vec![
                FROM_CONTEXT_SENTINEL.to_string(),
                "Bloedplaatjes stelpen wonden.".to_string(),
                "Ze klonteren samen.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_practice_in_empty_subsection() {
        let mut skeleton = skeleton_with(vec![]);
        let advisor = MockAdvisor::with_advice(PlanAdvice::default());
        let config = PlannerConfig::default();
        LayoutPlanner::new(&advisor, &config).plan(&mut skeleton).await;
        assert_eq!(skeleton.unit_count(), 0);
    }
}
