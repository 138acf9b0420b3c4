//! Stage 3: drive text generation over a planned skeleton.
//!
//! Two passes over the units, both in document order. The first pass
//! rewrites everything except invented practice scenarios; the second
//! writes those scenarios strictly in order so the shared redundancy
//! tracker can steer each one away from earlier openers and questions.
//!
//! The driver is resumable: units already present in the text map are
//! skipped, so an interrupted run picks up where it stopped.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Config, GeneratedTextMap, GenerationUnit, Skeleton, UnitKind, SKIP_TOKEN,
};
use crate::domain::ports::{GenerateRequest, TextGenerator};
use crate::infrastructure::retry::RetryPolicy;
use crate::services::redundancy::{RedundancyCheck, RedundancyTracker};
use crate::services::splitter::split_long_text;
use crate::services::text::{
    lowercase_first, normalize_ws, BOLD_END, BOLD_START, MICRO_END, MICRO_START,
};

const SYSTEM_PROMPT: &str = "\
Je herschrijft een Nederlands mbo-lesboek. Schrijf helder, concreet en \
activerend op mbo-niveau 3/4. Huisregels: korte zinnen, geen opsommingstekens, \
geen kopjes of labels in de lopende tekst, geen verwijzingen naar 'dit boek' of \
'dit hoofdstuk'. Markeer hooguit twee kerntermen per alinea met \
<<BOLD_START>> en <<BOLD_END>>. Alle vakinhoudelijke feiten uit de bron moeten \
terugkomen; voeg geen nieuwe feiten toe.";

/// Drives generation for every unit in a skeleton.
pub struct GenerationDriver<'a> {
    generator: &'a dyn TextGenerator,
    retry: RetryPolicy,
    config: &'a Config,
}

impl<'a> GenerationDriver<'a> {
    pub fn new(generator: &'a dyn TextGenerator, config: &'a Config) -> Self {
        Self { generator, retry: RetryPolicy::from_config(&config.retry), config }
    }

    /// Generate text for every unit, resuming into `map` if it already
    /// holds entries from an earlier run.
    pub async fn generate_map(
        &self,
        skeleton: &Skeleton,
        mut map: GeneratedTextMap,
    ) -> DomainResult<GeneratedTextMap> {
        let total = skeleton.unit_count() as u64;
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut tracker = RedundancyTracker::new();

        // Pass 1: everything except invented practice scenarios.
        for (unit, subsection_title) in units_in_order(skeleton) {
            if unit.is_generated_practice() {
                continue;
            }
            bar.inc(1);
            if map.get(&unit.unit_id).is_some() {
                continue;
            }
            if let Some(text) = self.generate_unit(unit, subsection_title, &tracker).await? {
                map.insert(&unit.unit_id, text);
            }
        }

        // Pass 2: invented practice scenarios, strictly ordered so each
        // sees every earlier accepted scenario.
        for (unit, subsection_title) in units_in_order(skeleton) {
            if !unit.is_generated_practice() {
                continue;
            }
            bar.inc(1);
            if let Some(existing) = map.get(&unit.unit_id) {
                tracker.record(existing);
                continue;
            }
            if let Some(text) = self.generate_unit(unit, subsection_title, &tracker).await? {
                tracker.record(&text);
                map.insert(&unit.unit_id, text);
            }
        }

        bar.finish_and_clear();
        info!(units = map.len(), "generation complete");
        Ok(map)
    }

    /// Generate and post-process one unit. Returns `None` when the
    /// model declines an invented practice scenario.
    async fn generate_unit(
        &self,
        unit: &GenerationUnit,
        subsection_title: &str,
        tracker: &RedundancyTracker,
    ) -> DomainResult<Option<String>> {
        let user = build_user_prompt(unit, subsection_title);
        let raw = self.call_model(&unit.unit_id, user).await?;
        let trimmed = raw.trim();

        if unit.is_generated_practice() && trimmed.contains(SKIP_TOKEN) {
            debug!(unit = %unit.unit_id, "model declined practice scenario");
            return Ok(None);
        }

        let mut text = if unit.kind.is_box() {
            clean_box_text(trimmed)
        } else {
            clean_body_text(trimmed)
        };

        if unit.is_generated_practice() {
            let check = tracker.check(&text);
            if !check.is_clean() {
                debug!(unit = %unit.unit_id, "practice scenario clashed, repairing");
                match self.repair_practice(unit, subsection_title, &text, &check).await {
                    Ok(repaired) => text = clean_box_text(&repaired),
                    Err(err) => {
                        warn!(unit = %unit.unit_id, error = %err,
                            "repair failed, keeping original scenario");
                    }
                }
            }
        }

        if let Some(title) = &unit.micro_heading {
            text = format!("{MICRO_START}{title}{MICRO_END}{text}");
        }

        let limits = if unit.kind.is_box() {
            self.config.split.box_limits()
        } else {
            self.config.split.body_limits()
        };
        Ok(Some(split_long_text(&text, &limits)))
    }

    async fn call_model(&self, unit_id: &str, user: String) -> DomainResult<String> {
        let request = GenerateRequest {
            system: SYSTEM_PROMPT.to_string(),
            user,
            temperature: self.config.model.temperature,
            max_tokens: self.config.model.max_tokens,
        };
        self.retry
            .execute(|| {
                let request = request.clone();
                async move { self.generator.generate(request).await }
            })
            .await
            .map_err(|source| DomainError::Generation { unit_id: unit_id.to_string(), source })
    }

    /// One repair round for a clashing practice scenario, naming the
    /// exact openers and questions to avoid.
    async fn repair_practice(
        &self,
        unit: &GenerationUnit,
        subsection_title: &str,
        text: &str,
        check: &RedundancyCheck,
    ) -> DomainResult<String> {
        let mut avoid = Vec::new();
        if let Some(opener) = &check.clashing_opener {
            avoid.push(format!("- begin niet met een zin die lijkt op: \"{opener}\""));
        }
        for question in &check.clashing_questions {
            avoid.push(format!("- stel niet opnieuw de vraag: \"{question}\""));
        }
        for phrase in &check.forbidden {
            avoid.push(format!("- gebruik de frase \"{phrase}\" niet"));
        }

        let user = format!(
            "Herschrijf dit praktijkscenario bij de paragraaf '{subsection_title}' zodat \
             het duidelijk anders opent en andere vragen stelt. Behoud het onderwerp.\n\n\
             Vermijd:\n{}\n\nScenario:\n{text}",
            avoid.join("\n")
        );
        self.call_model(&unit.unit_id, user).await
    }
}

fn units_in_order(skeleton: &Skeleton) -> impl Iterator<Item = (&GenerationUnit, &str)> {
    skeleton.sections.iter().flat_map(|s| {
        s.subsections.iter().flat_map(|ss| {
            ss.units
                .iter()
                .map(move |u| (u, ss.subsection_title.as_str()))
        })
    })
}

/// Build the unit brief handed to the model.
fn build_user_prompt(unit: &GenerationUnit, subsection_title: &str) -> String {
    let facts = unit
        .facts
        .iter()
        .skip(usize::from(unit.is_generated_practice()))
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");

    match unit.kind {
        UnitKind::Prose => format!(
            "Herschrijf deze alinea uit de paragraaf '{subsection_title}' als een \
             vloeiende alinea. Alle feiten moeten terugkomen, in dezelfde volgorde \
             waar dat natuurlijk leest.\n\nFeiten:\n{facts}"
        ),
        UnitKind::CompositeList => format!(
            "Verwerk deze inleiding en opsomming uit de paragraaf '{subsection_title}' \
             tot een vloeiende alinea zonder opsommingstekens. Elk opsommingspunt moet \
             herkenbaar terugkomen in de lopende tekst.\n\nBron:\n{facts}"
        ),
        UnitKind::BoxDeepening => format!(
            "Herschrijf deze stof als verdiepingstekst bij de paragraaf \
             '{subsection_title}': iets uitgebreider en preciezer dan de basistekst, \
             voor studenten die meer willen weten. Geen label, geen kop, begin direct \
             met de inhoud.\n\nFeiten:\n{facts}"
        ),
        UnitKind::BoxPractice if unit.is_generated_practice() => format!(
            "Bedenk een kort, realistisch praktijkscenario bij de paragraaf \
             '{subsection_title}' voor een mbo-student zorg. Gebruik de onderstaande \
             stof als anker. Sluit af met een of twee activerende vragen. Geen label, \
             geen kop. Als er bij deze stof geen geloofwaardig scenario te bedenken \
             valt, antwoord dan uitsluitend met {SKIP_TOKEN}.\n\nStof:\n{facts}"
        ),
        UnitKind::BoxPractice => format!(
            "Herschrijf dit bestaande praktijkvoorbeeld bij de paragraaf \
             '{subsection_title}'. Behoud de situatie en de strekking. Geen label, \
             geen kop, geen opsommingstekens.\n\nBron:\n{facts}"
        ),
    }
}

/// Box copy hygiene: no labels, no bullets, no markers, lowercase
/// opening so the text reads as a continuation of the box title.
fn clean_box_text(raw: &str) -> String {
    let unmarked = raw
        .replace(MICRO_START, " ")
        .replace(MICRO_END, " ")
        .replace(BOLD_START, "")
        .replace(BOLD_END, "");

    let mut lines = Vec::new();
    let mut first = true;
    for line in unmarked.lines() {
        let mut line = line.trim();
        if first && !line.is_empty() {
            for label in ["praktijk:", "verdieping:", "voorbeeld:", "scenario:"] {
                if line.to_lowercase().starts_with(label) {
                    line = line[label.len()..].trim_start();
                }
            }
            first = false;
        }
        for bullet in ["- ", "* ", "• "] {
            if let Some(rest) = line.strip_prefix(bullet) {
                line = rest;
            }
        }
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lowercase_first(&normalize_ws(&lines.join(" ")))
}

/// Body hygiene: keep paragraph breaks and bold spans, drop any
/// micro-heading markers the model emitted on its own.
fn clean_body_text(raw: &str) -> String {
    let stripped = raw.replace(MICRO_START, " ").replace(MICRO_END, " ");
    stripped
        .split("\n\n")
        .map(normalize_ws)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::GenerateError;
    use crate::domain::models::{
        BlockRef, SectionPlan, SubsectionPlan, FROM_CONTEXT_SENTINEL,
    };
    use crate::infrastructure::mock::MockGenerator;

    fn one_unit_skeleton(unit: GenerationUnit) -> Skeleton {
        Skeleton {
            book_id: "bio-7".into(),
            chapter: 1,
            sections: vec![SectionPlan {
                section_id: "s1".into(),
                section_title: "Het bloed".into(),
                subsections: vec![SubsectionPlan {
                    subsection_id: "ss1".into(),
                    subsection_title: "Samenstelling".into(),
                    units: vec![unit],
                }],
            }],
        }
    }

    fn prose_unit() -> GenerationUnit {
        let mut unit = GenerationUnit::new(UnitKind::Prose);
        unit.block_refs = vec![BlockRef::primary("b1")];
        unit.facts = vec!["Bloed vervoert zuurstof.".into()];
        unit
    }

    fn practice_unit() -> GenerationUnit {
        let mut unit = GenerationUnit::new(UnitKind::BoxPractice);
        unit.facts = vec![FROM_CONTEXT_SENTINEL.into(), "Bloed vervoert zuurstof.".into()];
        unit
    }

    #[tokio::test]
    async fn test_prose_unit_generated() {
        let generator = MockGenerator::with_responses(vec![Ok(
            "Het bloed vervoert zuurstof door het lichaam.".to_string(),
        )]);
        let config = Config::default();
        let driver = GenerationDriver::new(&generator, &config);
        let unit = prose_unit();
        let unit_id = unit.unit_id.clone();
        let skeleton = one_unit_skeleton(unit);

        let map = driver
            .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 1))
            .await
            .expect("generation succeeds");
        assert_eq!(map.get(&unit_id), Some("Het bloed vervoert zuurstof door het lichaam."));
    }

    #[tokio::test]
    async fn test_skip_token_leaves_no_entry() {
        let generator = MockGenerator::with_responses(vec![Ok(SKIP_TOKEN.to_string())]);
        let config = Config::default();
        let driver = GenerationDriver::new(&generator, &config);
        let skeleton = one_unit_skeleton(practice_unit());

        let map = driver
            .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 1))
            .await
            .expect("generation succeeds");
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_transient_error_retried() {
        let generator = MockGenerator::with_responses(vec![
            Err(GenerateError::RateLimited),
            Ok("Het bloed vervoert zuurstof.".to_string()),
        ]);
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 1;
        config.retry.jitter_ms = 0;
        let driver = GenerationDriver::new(&generator, &config);
        let unit = prose_unit();
        let unit_id = unit.unit_id.clone();
        let skeleton = one_unit_skeleton(unit);

        let map = driver
            .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 1))
            .await
            .expect("retry recovers");
        assert!(map.get(&unit_id).is_some());
        assert_eq!(generator.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_permanent_error_propagates() {
        let generator =
            MockGenerator::with_responses(vec![Err(GenerateError::InvalidApiKey)]);
        let config = Config::default();
        let driver = GenerationDriver::new(&generator, &config);
        let skeleton = one_unit_skeleton(prose_unit());

        let err = driver
            .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 1))
            .await
            .expect_err("must fail");
        assert!(matches!(err, DomainError::Generation { .. }));
        assert_eq!(generator.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_micro_heading_prepended() {
        let generator = MockGenerator::with_responses(vec![Ok(
            "Het bloed vervoert zuurstof.".to_string(),
        )]);
        let config = Config::default();
        let driver = GenerationDriver::new(&generator, &config);
        let mut unit = prose_unit();
        unit.micro_heading = Some("Zuurstoftransport".to_string());
        let unit_id = unit.unit_id.clone();
        let skeleton = one_unit_skeleton(unit);

        let map = driver
            .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 1))
            .await
            .expect("generation succeeds");
        let text = map.get(&unit_id).expect("entry");
        assert!(text.starts_with(&format!("{MICRO_START}Zuurstoftransport{MICRO_END}")));
    }

    #[tokio::test]
    async fn test_resume_skips_existing_entries() {
        let generator = MockGenerator::with_responses(vec![]);
        let config = Config::default();
        let driver = GenerationDriver::new(&generator, &config);
        let unit = prose_unit();
        let unit_id = unit.unit_id.clone();
        let skeleton = one_unit_skeleton(unit);

        let mut map = GeneratedTextMap::new("bio-7", 1);
        map.insert(&unit_id, "al gegenereerd");
        let map = driver.generate_map(&skeleton, map).await.expect("resume");
        assert_eq!(map.get(&unit_id), Some("al gegenereerd"));
        assert_eq!(generator.call_count().await, 0);
    }

    #[test]
    fn test_clean_box_text_hygiene() {
        let raw = "Praktijk: - De bewoner belt.\n- Je komt binnen.";
        assert_eq!(clean_box_text(raw), "de bewoner belt. Je komt binnen.");
    }

    #[test]
    fn test_clean_box_text_spares_abbreviation() {
        assert_eq!(clean_box_text("ADH regelt de vochtbalans."), "ADH regelt de vochtbalans.");
    }

    #[test]
    fn test_clean_body_strips_stray_micro_markers() {
        let raw = format!("{MICRO_START}Eigen kop{MICRO_END}De tekst zelf.");
        assert_eq!(clean_body_text(&raw), "Eigen kop De tekst zelf.");
    }

    #[test]
    fn test_practice_prompt_mentions_skip_token() {
        let prompt = build_user_prompt(&practice_unit(), "Samenstelling");
        assert!(prompt.contains(SKIP_TOKEN));
        assert!(!prompt.contains(FROM_CONTEXT_SENTINEL));
    }
}
