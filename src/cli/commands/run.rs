//! `bookloom run`: the full pipeline in one invocation, persisting the
//! intermediate artifacts so a failed run can be resumed per stage.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::domain::models::{Config, GeneratedTextMap};
use crate::infrastructure::store;
use crate::services::{assemble_chapter, decompose_chapter, GenerationDriver, LayoutPlanner};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Book identifier recorded in the artifacts.
    #[arg(long)]
    pub book_id: String,

    /// Chapter tree JSON to rewrite.
    #[arg(long)]
    pub chapter: PathBuf,

    /// Where to write the rewritten chapter.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Directory for the intermediate skeleton and text map.
    #[arg(long, default_value = "bookloom-work")]
    pub workdir: PathBuf,

    /// Run without the API: heuristic planning, echoing generator.
    #[arg(long)]
    pub offline: bool,
}

pub async fn execute(args: RunArgs, config: &Config) -> anyhow::Result<()> {
    let chapter = store::read_chapter(&args.chapter)?;

    // Unit ids are fresh per decomposition, so a resumable run must
    // reuse the skeleton it wrote the first time around.
    let skeleton_path = args.workdir.join(format!("chapter-{}.skeleton.json", chapter.number));
    let skeleton = if skeleton_path.exists() {
        let existing = store::read_skeleton(&skeleton_path)?;
        info!(units = existing.unit_count(), path = %skeleton_path.display(),
            "reusing existing skeleton");
        existing
    } else {
        let mut skeleton = decompose_chapter(&args.book_id, &chapter);
        let advisor = super::advisor(config, args.offline)?;
        LayoutPlanner::new(advisor.as_ref(), &config.planner)
            .plan(&mut skeleton)
            .await;
        store::write_skeleton(&skeleton_path, &skeleton)?;
        info!(units = skeleton.unit_count(), path = %skeleton_path.display(), "skeleton written");
        skeleton
    };

    let map_path = args.workdir.join(format!("chapter-{}.texts.json", chapter.number));
    let map = if map_path.exists() {
        let existing = store::read_text_map(&map_path)?;
        info!(entries = existing.len(), "resuming into existing text map");
        existing
    } else {
        GeneratedTextMap::new(&args.book_id, chapter.number)
    };
    let generator = super::generator(config, args.offline)?;
    let driver = GenerationDriver::new(generator.as_ref(), config);
    let map = driver.generate_map(&skeleton, map).await?;
    store::write_text_map(&map_path, &map)?;
    info!(entries = map.len(), path = %map_path.display(), "text map written");

    let rewritten = assemble_chapter(&chapter, &skeleton, &map);
    store::write_chapter(&args.output, &rewritten)?;
    info!(path = %args.output.display(), "rewritten chapter written");
    Ok(())
}
