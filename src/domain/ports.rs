//! Ports to external capabilities.
//!
//! The service layer depends only on these traits; the infrastructure
//! layer provides the live Anthropic adapter and a scripted mock.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::GenerateError;

/// A single text-generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// System prompt (house rules, role).
    pub system: String,
    /// User prompt (the unit brief).
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Capability that turns a prompt into rewritten text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError>;
}

/// One candidate unit offered to the layout advisor.
#[derive(Debug, Clone, Serialize)]
pub struct PlanCandidate {
    pub unit_id: String,
    /// First words of the unit, enough to judge its topic.
    pub preview: String,
    pub word_count: usize,
}

/// A section-scoped layout question: which candidates deserve a
/// micro-heading, and which deserve promotion to a deepening box.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest {
    pub section_title: String,
    pub heading_candidates: Vec<PlanCandidate>,
    pub deepening_candidates: Vec<PlanCandidate>,
}

/// The advisor's answer. Missing fields deserialize to empty, so a
/// partial answer degrades gracefully instead of failing the stage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanAdvice {
    /// unit_id -> proposed micro-heading title.
    #[serde(default)]
    pub micro_headings: HashMap<String, String>,
    /// Units the advisor would promote to a deepening box.
    #[serde(default)]
    pub promoted_unit_ids: Vec<String>,
}

/// Capability that advises on per-section layout decisions.
#[async_trait]
pub trait LayoutAdvisor: Send + Sync {
    async fn plan(&self, request: PlanRequest) -> Result<PlanAdvice, GenerateError>;
}
