//! `bookloom assemble`: tree + skeleton + texts in, rewritten tree out.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::domain::models::Config;
use crate::infrastructure::store;
use crate::services::assemble_chapter;

#[derive(Debug, Args)]
pub struct AssembleArgs {
    /// Original chapter tree JSON.
    #[arg(long)]
    pub chapter: PathBuf,

    /// Planned skeleton JSON.
    #[arg(long)]
    pub skeleton: PathBuf,

    /// Generated text map JSON.
    #[arg(long)]
    pub map: PathBuf,

    /// Where to write the rewritten chapter.
    #[arg(long, short)]
    pub output: PathBuf,
}

pub async fn execute(args: AssembleArgs, _config: &Config) -> anyhow::Result<()> {
    let chapter = store::read_chapter(&args.chapter)?;
    let skeleton = store::read_skeleton(&args.skeleton)?;
    let map = store::read_text_map(&args.map)?;

    let rewritten = assemble_chapter(&chapter, &skeleton, &map);
    store::write_chapter(&args.output, &rewritten)?;
    info!(path = %args.output.display(), "rewritten chapter written");
    Ok(())
}
