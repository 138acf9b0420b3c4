//! End-to-end pipeline tests against scripted capability ports.

use bookloom::domain::models::{
    Chapter, Config, ContentBlock, GeneratedTextMap, Section, Subsection, SKIP_TOKEN,
};
use bookloom::infrastructure::mock::{MockAdvisor, MockGenerator};
use bookloom::infrastructure::store;
use bookloom::services::{assemble_chapter, decompose_chapter, GenerationDriver, LayoutPlanner};

fn sample_chapter() -> Chapter {
    Chapter {
        number: 3,
        title: "Het bloed".into(),
        sections: vec![Section {
            id: "s1".into(),
            number: "3.1".into(),
            title: "Samenstelling".into(),
            subsections: vec![Subsection {
                id: "ss1".into(),
                number: "3.1.1".into(),
                title: "Bloedcellen".into(),
                blocks: vec![
                    ContentBlock::prose("h1", "3.1.1 Bloedcellen").with_style_hint("heading-3"),
                    ContentBlock::prose(
                        "b1",
                        "Rode bloedcellen vervoeren zuurstof. Witte bloedcellen ruimen \
                         ziekteverwekkers op.",
                    ),
                    ContentBlock::prose("b2", "Het bloedplasma bevat onder andere:"),
                    ContentBlock::list(
                        "b3",
                        vec!["water".into(), "eiwitten".into(), "voedingsstoffen".into()],
                    ),
                ],
            }],
        }],
    }
}

async fn planned_skeleton(chapter: &Chapter) -> bookloom::domain::models::Skeleton {
    let mut skeleton = decompose_chapter("bio-7", chapter);
    let advisor = MockAdvisor::empty();
    let config = Config::default();
    LayoutPlanner::new(&advisor, &config.planner)
        .plan(&mut skeleton)
        .await;
    skeleton
}

fn normalized_content(chapter: &Chapter) -> String {
    fn visit(blocks: &[ContentBlock], words: &mut Vec<String>) {
        for block in blocks {
            words.extend(block.text.split_whitespace().map(String::from));
            for item in &block.items {
                words.extend(item.split_whitespace().map(String::from));
            }
            visit(&block.children, words);
        }
    }
    let mut words = Vec::new();
    for section in &chapter.sections {
        for subsection in &section.subsections {
            visit(&subsection.blocks, &mut words);
        }
    }
    words.join(" ")
}

#[test]
fn identity_map_reproduces_source_text() {
    let chapter = sample_chapter();
    let skeleton = decompose_chapter("bio-7", &chapter);

    let mut map = GeneratedTextMap::new("bio-7", 3);
    for unit in skeleton.units() {
        map.insert(&unit.unit_id, unit.facts.join(" "));
    }

    let out = assemble_chapter(&chapter, &skeleton, &map);
    assert_eq!(normalized_content(&out), normalized_content(&chapter));
}

#[test]
fn no_two_units_share_a_primary_block() {
    let chapter = sample_chapter();
    let skeleton = decompose_chapter("bio-7", &chapter);

    let mut seen = std::collections::HashSet::new();
    for unit in skeleton.units() {
        if let Some(id) = unit.primary_block_id() {
            assert!(seen.insert(id.to_string()), "duplicate primary ref: {id}");
            assert_ne!(id, "h1", "heading blocks are never claimed for rewriting");
        }
    }
}

#[tokio::test]
async fn full_pipeline_rewrites_chapter() {
    let chapter = sample_chapter();
    let skeleton = planned_skeleton(&chapter).await;

    // Two body units plus one injected practice scenario.
    assert_eq!(skeleton.unit_count(), 3);

    let generator = MockGenerator::with_responses(vec![
        Ok("Rode bloedcellen vervoeren zuurstof en witte bloedcellen ruimen \
            ziekteverwekkers op."
            .to_string()),
        Ok("Het bloedplasma bevat onder andere water, eiwitten en voedingsstoffen."
            .to_string()),
        Ok("Tijdens je stage prik je bloed bij een bewoner. Welke bestanddelen zitten \
            in de buis?"
            .to_string()),
    ]);
    let config = Config::default();
    let driver = GenerationDriver::new(&generator, &config);
    let map = driver
        .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 3))
        .await
        .expect("generation succeeds");
    assert_eq!(map.len(), 3);

    let rewritten = assemble_chapter(&chapter, &skeleton, &map);

    // Heading byte-identical.
    assert_eq!(
        rewritten.find_block("h1").expect("h1").text,
        "3.1.1 Bloedcellen"
    );
    // Body prose replaced.
    assert!(rewritten
        .find_block("b1")
        .expect("b1")
        .text
        .starts_with("Rode bloedcellen vervoeren"));
    // Lead-in and list fused into one block, list emptied.
    assert!(rewritten
        .find_block("b2")
        .expect("b2")
        .text
        .contains("water, eiwitten en voedingsstoffen"));
    let list_block = rewritten.find_block("b3").expect("b3");
    assert!(list_block.merged);
    assert!(list_block.items.is_empty());
    // Practice scenario landed on the last body block.
    let practice_host = rewritten.find_block("b2").expect("b2");
    assert!(practice_host
        .practice_text
        .as_deref()
        .is_some_and(|t| t.contains("stage")));
    // Original chapter untouched.
    assert_eq!(chapter.find_block("b3").expect("b3").items.len(), 3);
}

#[tokio::test]
async fn skip_token_omits_practice_box() {
    let chapter = sample_chapter();
    let skeleton = planned_skeleton(&chapter).await;

    let generator = MockGenerator::with_responses(vec![
        Ok("Eerste alinea.".to_string()),
        Ok("Tweede alinea.".to_string()),
        Ok(SKIP_TOKEN.to_string()),
    ]);
    let config = Config::default();
    let driver = GenerationDriver::new(&generator, &config);
    let map = driver
        .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 3))
        .await
        .expect("generation succeeds");
    assert_eq!(map.len(), 2);

    let rewritten = assemble_chapter(&chapter, &skeleton, &map);
    assert!(rewritten.find_block("b2").expect("b2").practice_text.is_none());
}

#[tokio::test]
async fn artifacts_survive_file_round_trip() {
    let chapter = sample_chapter();
    let skeleton = planned_skeleton(&chapter).await;

    let generator = MockGenerator::with_responses(vec![
        Ok("Eerste alinea.".to_string()),
        Ok("Tweede alinea met water, eiwitten en voedingsstoffen.".to_string()),
        Ok("Op de afdeling zie je dit terug. Wat valt je op?".to_string()),
    ]);
    let config = Config::default();
    let driver = GenerationDriver::new(&generator, &config);
    let map = driver
        .generate_map(&skeleton, GeneratedTextMap::new("bio-7", 3))
        .await
        .expect("generation succeeds");

    let dir = tempfile::tempdir().expect("tempdir");
    let skeleton_path = dir.path().join("skeleton.json");
    let map_path = dir.path().join("texts.json");
    store::write_skeleton(&skeleton_path, &skeleton).expect("write skeleton");
    store::write_text_map(&map_path, &map).expect("write map");

    let skeleton2 = store::read_skeleton(&skeleton_path).expect("read skeleton");
    let map2 = store::read_text_map(&map_path).expect("read map");

    let direct = assemble_chapter(&chapter, &skeleton, &map);
    let via_files = assemble_chapter(&chapter, &skeleton2, &map2);
    assert_eq!(
        serde_json::to_string(&direct).expect("serialize"),
        serde_json::to_string(&via_files).expect("serialize")
    );
}

#[tokio::test]
async fn generation_resumes_from_existing_map() {
    let chapter = sample_chapter();
    let skeleton = planned_skeleton(&chapter).await;

    // Pre-fill the two body units; only the practice unit needs a call.
    let mut map = GeneratedTextMap::new("bio-7", 3);
    for unit in skeleton.units().filter(|u| u.kind.is_body()) {
        map.insert(&unit.unit_id, "Al eerder gegenereerd.");
    }

    let generator = MockGenerator::with_responses(vec![Ok(
        "Een nieuw scenario. Wat doe je?".to_string(),
    )]);
    let config = Config::default();
    let driver = GenerationDriver::new(&generator, &config);
    let map = driver
        .generate_map(&skeleton, map)
        .await
        .expect("generation succeeds");

    assert_eq!(map.len(), 3);
    assert_eq!(generator.call_count().await, 1);
}
