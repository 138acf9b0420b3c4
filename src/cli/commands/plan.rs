//! `bookloom plan`: chapter tree in, planned skeleton out.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::domain::models::Config;
use crate::infrastructure::store;
use crate::services::{decompose_chapter, LayoutPlanner};

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Book identifier recorded in the skeleton.
    #[arg(long)]
    pub book_id: String,

    /// Chapter tree JSON to decompose.
    #[arg(long)]
    pub chapter: PathBuf,

    /// Where to write the planned skeleton.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Skip the layout advisor; plan with local heuristics only.
    #[arg(long)]
    pub offline: bool,
}

pub async fn execute(args: PlanArgs, config: &Config) -> anyhow::Result<()> {
    let chapter = store::read_chapter(&args.chapter)?;
    let mut skeleton = decompose_chapter(&args.book_id, &chapter);
    info!(units = skeleton.unit_count(), "chapter decomposed");

    let advisor = super::advisor(config, args.offline)?;
    LayoutPlanner::new(advisor.as_ref(), &config.planner)
        .plan(&mut skeleton)
        .await;
    info!(units = skeleton.unit_count(), "layout planned");

    store::write_skeleton(&args.output, &skeleton)?;
    info!(path = %args.output.display(), "skeleton written");
    Ok(())
}
