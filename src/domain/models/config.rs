//! Run configuration.
//!
//! Every knob has a default tuned for Dutch vocational textbooks; a
//! YAML file or environment variables override individual fields.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
    pub timeout_secs: u64,
    /// API key; falls back to the ANTHROPIC_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "claude-opus-4-5-20251101".to_string(),
            temperature: 0.25,
            max_tokens: 1024,
            base_url: "https://api.anthropic.com".to_string(),
            timeout_secs: 120,
            api_key: None,
        }
    }
}

/// Layout planner thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Minimum words before a body unit is offered a micro-heading.
    pub micro_heading_floor: usize,
    /// Minimum words before a body unit is a promotion candidate.
    pub deepening_floor: usize,
    /// Per-section promotion band: max(base, ceil(pct * candidates)).
    pub promotion_min_base: usize,
    pub promotion_min_pct: f64,
    /// Per-section promotion band: min(floor(pct * candidates), cap).
    pub promotion_max_pct: f64,
    pub promotion_hard_cap: usize,
    /// Leading units per section never promoted away from the body.
    pub protected_lead_units: usize,
    /// Anchor facts handed to an injected practice unit.
    pub context_facts: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            micro_heading_floor: 40,
            deepening_floor: 90,
            promotion_min_base: 2,
            promotion_min_pct: 0.08,
            promotion_max_pct: 0.14,
            promotion_hard_cap: 6,
            protected_lead_units: 2,
            context_facts: 3,
        }
    }
}

/// Paragraph splitting limits, in countable words.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub body_max_words: usize,
    pub body_target_words: usize,
    pub body_min_words: usize,
    pub box_max_words: usize,
    pub box_target_words: usize,
    pub box_min_words: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            body_max_words: 220,
            body_target_words: 150,
            body_min_words: 60,
            box_max_words: 190,
            box_target_words: 120,
            box_min_words: 40,
        }
    }
}

/// Retry/backoff settings for transient generation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Uniform random jitter added to each backoff, 0 to disable.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
            jitter_ms: 250,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}
