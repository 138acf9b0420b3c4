//! Subcommand implementations.

pub mod assemble;
pub mod generate;
pub mod plan;
pub mod run;

use crate::domain::models::Config;
use crate::domain::ports::{LayoutAdvisor, TextGenerator};
use crate::infrastructure::anthropic::AnthropicClient;
use crate::infrastructure::mock::{MockAdvisor, MockGenerator};

/// Build the layout advisor: the live API client, or a no-advice stand-in
/// for offline runs.
pub(crate) fn advisor(config: &Config, offline: bool) -> anyhow::Result<Box<dyn LayoutAdvisor>> {
    if offline {
        Ok(Box::new(MockAdvisor::empty()))
    } else {
        Ok(Box::new(AnthropicClient::new(config.model.clone())?))
    }
}

/// Build the text generator: the live API client, or an echoing
/// stand-in that makes offline runs inspectable without spending tokens.
pub(crate) fn generator(config: &Config, offline: bool) -> anyhow::Result<Box<dyn TextGenerator>> {
    if offline {
        Ok(Box::new(MockGenerator::echoing()))
    } else {
        Ok(Box::new(AnthropicClient::new(config.model.clone())?))
    }
}
