//! Command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::models::Config;

#[derive(Debug, Parser)]
#[command(name = "bookloom", version, about = "Rewrite structured textbook chapters")]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decompose a chapter and plan its layout into a skeleton.
    Plan(commands::plan::PlanArgs),
    /// Generate text for every unit in a skeleton.
    Generate(commands::generate::GenerateArgs),
    /// Assemble the rewritten chapter from tree, skeleton, and texts.
    Assemble(commands::assemble::AssembleArgs),
    /// Run the full pipeline end to end.
    Run(commands::run::RunArgs),
}

/// Dispatch a parsed invocation.
pub async fn dispatch(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, &config).await,
        Commands::Generate(args) => commands::generate::execute(args, &config).await,
        Commands::Assemble(args) => commands::assemble::execute(args, &config).await,
        Commands::Run(args) => commands::run::execute(args, &config).await,
    }
}
