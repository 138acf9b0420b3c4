//! Configuration loading.
//!
//! Layered: built-in defaults, then an optional YAML file, then
//! environment variables prefixed `BOOKLOOM_` (nested fields separated
//! by `__`, e.g. `BOOKLOOM_MODEL__NAME`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;
use tracing::debug;

use crate::domain::models::Config;

const DEFAULT_CONFIG_FILE: &str = "bookloom.yaml";
const ENV_PREFIX: &str = "BOOKLOOM_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads and validates the layered configuration.
pub struct ConfigLoader {
    file: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self { file: PathBuf::from(DEFAULT_CONFIG_FILE) }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(path: impl AsRef<Path>) -> Self {
        Self { file: path.as_ref().to_path_buf() }
    }

    pub fn load(&self) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&self.file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        validate(&config)?;
        debug!(file = %self.file.display(), "configuration loaded");
        Ok(config)
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

    if config.planner.micro_heading_floor == 0 || config.planner.deepening_floor == 0 {
        return invalid("planner floors must be positive");
    }
    if config.planner.micro_heading_floor > config.planner.deepening_floor {
        return invalid("micro_heading_floor must not exceed deepening_floor");
    }
    for (name, pct) in [
        ("promotion_min_pct", config.planner.promotion_min_pct),
        ("promotion_max_pct", config.planner.promotion_max_pct),
    ] {
        if !(0.0..=1.0).contains(&pct) {
            return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
        }
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        return invalid("initial_backoff_ms must not exceed max_backoff_ms");
    }
    for (scope, min, target, max) in [
        (
            "body",
            config.split.body_min_words,
            config.split.body_target_words,
            config.split.body_max_words,
        ),
        (
            "box",
            config.split.box_min_words,
            config.split.box_target_words,
            config.split.box_max_words,
        ),
    ] {
        if !(min < target && target < max) {
            return Err(ConfigError::Invalid(format!(
                "{scope} split limits must satisfy min < target < max"
            )));
        }
    }
    if !["trace", "debug", "info", "warn", "error"]
        .contains(&config.logging.level.as_str())
    {
        return invalid("logging.level must be one of trace/debug/info/warn/error");
    }
    Ok(())
}
