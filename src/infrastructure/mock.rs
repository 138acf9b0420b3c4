//! Scripted in-memory implementations of the capability ports.
//!
//! Used by unit and integration tests and by the `--offline` CLI mode.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::GenerateError;
use crate::domain::ports::{
    GenerateRequest, LayoutAdvisor, PlanAdvice, PlanRequest, TextGenerator,
};

/// Text generator that replays a scripted queue of responses and
/// records every request it receives.
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl MockGenerator {
    pub fn with_responses(responses: Vec<Result<String, GenerateError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Generator that echoes its own facts section back; handy when a
    /// test only cares about plumbing, not content.
    pub fn echoing() -> Self {
        Self::with_responses(Vec::new())
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn last_request(&self) -> Option<GenerateRequest> {
        self.calls.lock().await.last().cloned()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError> {
        self.calls.lock().await.push(request.clone());
        match self.responses.lock().await.pop_front() {
            Some(response) => response,
            // Unscripted call: echo the prompt body so the test output
            // shows what was asked.
            None => Ok(request.user),
        }
    }
}

/// Layout advisor returning a fixed answer or a fixed failure.
pub struct MockAdvisor {
    outcome: Result<PlanAdvice, GenerateError>,
    requests: Mutex<Vec<PlanRequest>>,
}

impl MockAdvisor {
    pub fn with_advice(advice: PlanAdvice) -> Self {
        Self { outcome: Ok(advice), requests: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err(GenerateError::ServerError { status: 500, message: "scripted".into() }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Advisor that proposes nothing; planning falls through to the
    /// local heuristics.
    pub fn empty() -> Self {
        Self::with_advice(PlanAdvice::default())
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LayoutAdvisor for MockAdvisor {
    async fn plan(&self, request: PlanRequest) -> Result<PlanAdvice, GenerateError> {
        self.requests.lock().await.push(request);
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let generator = MockGenerator::with_responses(vec![
            Ok("eerste".to_string()),
            Err(GenerateError::RateLimited),
        ]);
        let request = GenerateRequest {
            system: String::new(),
            user: "prompt".to_string(),
            temperature: 0.2,
            max_tokens: 100,
        };
        assert_eq!(generator.generate(request.clone()).await.expect("first"), "eerste");
        assert!(generator.generate(request.clone()).await.is_err());
        // Exhausted queue echoes the prompt.
        assert_eq!(generator.generate(request).await.expect("echo"), "prompt");
        assert_eq!(generator.call_count().await, 3);
    }
}
