//! Zero-cost mock provider for local and test use.
//!
//! Requires no API key, never makes network calls, and always reports zero
//! tokens and zero cost so pipeline accounting stays at zero. The LLM
//! service falls back to this adapter when no vendor credentials are
//! configured, keeping pipelines runnable on a laptop with no secrets.

use async_trait::async_trait;

use crate::orchestrator::error::Result;
use crate::orchestrator::provider_client::{
    GenerationRequest, GenerationResult, ProviderClient,
};

/// Maximum number of characters of the combined prompt echoed back.
const PREVIEW_LIMIT: usize = 1000;

/// Deterministic, network-free provider.
#[derive(Debug, Default)]
pub struct MockProvider {
    canned_content: Option<String>,
    canned_usage: Option<(u64, u64, f64)>,
}

impl MockProvider {
    /// Standard mock: echoes a preview of the prompt it was given.
    pub fn new() -> Self {
        MockProvider {
            canned_content: None,
            canned_usage: None,
        }
    }

    /// Mock that returns a fixed body instead of the prompt echo. Used by
    /// tests that need to exercise JSON-shaped completions.
    pub fn with_canned_content(content: impl Into<String>) -> Self {
        MockProvider {
            canned_content: Some(content.into()),
            canned_usage: None,
        }
    }

    /// Additionally report fixed token counts and cost. Used by accounting
    /// tests; the standard mock always reports zero.
    pub fn with_canned_usage(mut self, input_tokens: u64, output_tokens: u64, cost: f64) -> Self {
        self.canned_usage = Some((input_tokens, output_tokens, cost));
        self
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let content = match &self.canned_content {
            Some(canned) => canned.clone(),
            None => {
                // Simple deterministic behaviour so pipelines still work;
                // truncated to avoid huge echoes.
                let combined = format!(
                    "{}\n{}",
                    request.system_prompt.as_deref().unwrap_or(""),
                    request.prompt
                );
                let preview: String = combined.trim().chars().take(PREVIEW_LIMIT).collect();
                format!(
                    "MOCK LLM RESPONSE (no real model was called).\n\nPrompt preview:\n{}",
                    preview
                )
            }
        };

        let (input_tokens, output_tokens, cost) = self.canned_usage.unwrap_or((0, 0, 0.0));

        Ok(GenerationResult {
            content,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost,
            model: request
                .model
                .clone()
                .unwrap_or_else(|| "mock-llm".to_string()),
        })
    }

    fn count_tokens(&self, _text: &str) -> usize {
        // Always 0 to keep cost/token accounting at zero.
        0
    }

    fn calculate_cost(&self, _input_tokens: u64, _output_tokens: u64, _model: &str) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_a_prompt_preview() {
        let provider = MockProvider::new();
        let mut request = GenerationRequest::new("Hello there");
        request.system_prompt = Some("Be brief.".to_string());

        let result = provider.generate(&request).await.unwrap();
        assert!(result.content.starts_with("MOCK LLM RESPONSE"));
        assert!(result.content.contains("Be brief."));
        assert!(result.content.contains("Hello there"));
        assert_eq!(result.total_tokens, 0);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.model, "mock-llm");
    }

    #[tokio::test]
    async fn truncates_long_prompts() {
        let provider = MockProvider::new();
        let request = GenerationRequest::new("x".repeat(5000));

        let result = provider.generate(&request).await.unwrap();
        let preview = result
            .content
            .split("Prompt preview:\n")
            .nth(1)
            .unwrap_or_default();
        assert_eq!(preview.chars().count(), 1000);
    }

    #[tokio::test]
    async fn canned_content_replaces_the_echo() {
        let provider = MockProvider::with_canned_content("{\"k\":1}");
        let result = provider
            .generate(&GenerationRequest::new("ignored"))
            .await
            .unwrap();
        assert_eq!(result.content, "{\"k\":1}");
    }

    #[tokio::test]
    async fn respects_model_override() {
        let provider = MockProvider::new();
        let mut request = GenerationRequest::new("hi");
        request.model = Some("mock-pro".to_string());
        let result = provider.generate(&request).await.unwrap();
        assert_eq!(result.model, "mock-pro");
    }
}
