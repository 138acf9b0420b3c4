//! Binary entry point.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use bookloom::cli::{self, Cli};
use bookloom::domain::models::config::LoggingConfig;
use bookloom::infrastructure::config::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_file(path),
        None => ConfigLoader::new(),
    };
    let config = match loader.load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(2);
        }
    };

    init_tracing(&config.logging);

    if let Err(err) = cli::dispatch(cli, config).await {
        error!(error = %err, "command failed");
        std::process::exit(1);
    }
}

/// RUST_LOG wins over the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "compact" {
        builder.compact().init();
    } else {
        builder.init();
    }
}
