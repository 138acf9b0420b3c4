//! `bookloom generate`: skeleton in, unit texts out.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::domain::models::{Config, GeneratedTextMap};
use crate::infrastructure::store;
use crate::services::GenerationDriver;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Planned skeleton JSON.
    #[arg(long)]
    pub skeleton: PathBuf,

    /// Where to write the generated text map. If the file already
    /// exists its entries are kept and generation resumes.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Use the echoing stand-in generator instead of the API.
    #[arg(long)]
    pub offline: bool,
}

pub async fn execute(args: GenerateArgs, config: &Config) -> anyhow::Result<()> {
    let skeleton = store::read_skeleton(&args.skeleton)?;

    let map = if args.output.exists() {
        let existing = store::read_text_map(&args.output)?;
        info!(entries = existing.len(), "resuming into existing text map");
        existing
    } else {
        GeneratedTextMap::new(&skeleton.book_id, skeleton.chapter)
    };

    let generator = super::generator(config, args.offline)?;
    let driver = GenerationDriver::new(generator.as_ref(), config);
    let map = driver.generate_map(&skeleton, map).await?;

    store::write_text_map(&args.output, &map)?;
    info!(entries = map.len(), path = %args.output.display(), "text map written");
    Ok(())
}
