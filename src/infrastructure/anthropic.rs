//! Anthropic Messages API adapter.
//!
//! Implements both capability ports against the same endpoint: plain
//! text generation for the rewrite prompts, and JSON-answer planning
//! for the layout advisor.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::domain::errors::GenerateError;
use crate::domain::models::ModelConfig;
use crate::domain::ports::{
    GenerateRequest, LayoutAdvisor, PlanAdvice, PlanRequest, TextGenerator,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "/v1/messages";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    part_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl AnthropicClient {
    /// Build a client from config. The API key comes from the config
    /// or, failing that, the `ANTHROPIC_API_KEY` environment variable.
    pub fn new(config: ModelConfig) -> Result<Self, GenerateError> {
        let api_key = match &config.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| GenerateError::InvalidApiKey)?,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerateError::Network(e.to_string()))?;
        Ok(Self { client, config, api_key })
    }

    async fn send(&self, system: String, user: String, temperature: f32, max_tokens: u32)
        -> Result<String, GenerateError>
    {
        let body = MessagesRequest {
            model: self.config.name.clone(),
            max_tokens,
            temperature,
            system,
            messages: vec![Message { role: "user", content: user }],
        };
        let url = format!("{}{MESSAGES_PATH}", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::MalformedResponse(e.to_string()))?;
        let text: String = parsed
            .content
            .iter()
            .filter(|p| p.part_type == "text")
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        debug!(chars = text.len(), "model response received");
        Ok(text)
    }
}

fn map_transport_error(err: reqwest::Error) -> GenerateError {
    if err.is_timeout() {
        GenerateError::Timeout
    } else {
        GenerateError::Network(err.to_string())
    }
}

fn map_status_error(status: u16, body: &str) -> GenerateError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    match status {
        400 => GenerateError::InvalidRequest(message),
        401 | 403 => GenerateError::InvalidApiKey,
        429 => GenerateError::RateLimited,
        s if s >= 500 => GenerateError::ServerError { status: s, message },
        s => GenerateError::ServerError { status: s, message },
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError> {
        self.send(request.system, request.user, request.temperature, request.max_tokens)
            .await
    }
}

const PLAN_SYSTEM: &str = "\
Je adviseert over de opmaak van een mbo-lesboekparagraaf. Antwoord \
uitsluitend met een JSON-object met twee velden: \"micro_headings\" \
(object van unit_id naar een korte kop van twee tot vier woorden) en \
\"promoted_unit_ids\" (lijst van unit_ids die als verdiepingskader \
beter tot hun recht komen). Geen andere tekst.";

#[async_trait]
impl LayoutAdvisor for AnthropicClient {
    async fn plan(&self, request: PlanRequest) -> Result<PlanAdvice, GenerateError> {
        let payload = json!({
            "section_title": request.section_title,
            "heading_candidates": request.heading_candidates,
            "deepening_candidates": request.deepening_candidates,
        });
        let user = format!(
            "Sectie en kandidaten:\n{}",
            serde_json::to_string_pretty(&payload)
                .map_err(|e| GenerateError::InvalidRequest(e.to_string()))?
        );
        let raw = self
            .send(PLAN_SYSTEM.to_string(), user, 0.0, self.config.max_tokens)
            .await?;
        let cleaned = extract_json(&raw);
        serde_json::from_str(cleaned)
            .map_err(|e| GenerateError::MalformedResponse(format!("plan answer: {e}")))
    }
}

/// Strip a markdown code fence around a JSON answer, if present.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_fence) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence)
        .trim_start();
    inner.rsplit_once("```").map(|(body, _)| body.trim()).unwrap_or(inner)
}
