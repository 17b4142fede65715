//! OpenAI provider adapter.
//!
//! Calls the Chat Completions endpoint with an optional system message
//! followed by the user prompt, and reports the server-billed token counts.
//! Token counting for budgeting purposes uses the `cl100k_base` BPE
//! encoding, the family used by OpenAI's small chat models.

use async_trait::async_trait;
use serde_json::json;
use tiktoken_rs::CoreBPE;

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::provider_client::{
    price_for, GenerationRequest, GenerationResult, ModelPricing, ProviderClient,
};
use crate::orchestrator::providers::common::{env_or, env_u32, get_shared_http_client};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// USD per 1M tokens (2024 list prices). Unknown models price at the
/// `gpt-3.5-turbo` row.
const PRICING: &[(&str, ModelPricing)] = &[
    (
        "gpt-4-turbo-preview",
        ModelPricing {
            input: 10.0,
            output: 30.0,
        },
    ),
    (
        "gpt-4",
        ModelPricing {
            input: 30.0,
            output: 60.0,
        },
    ),
    (
        "gpt-3.5-turbo",
        ModelPricing {
            input: 0.5,
            output: 1.5,
        },
    ),
    (
        "gpt-4o",
        ModelPricing {
            input: 2.5,
            output: 10.0,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPricing {
            input: 0.15,
            output: 0.6,
        },
    ),
];

const FALLBACK_PRICING: ModelPricing = ModelPricing {
    input: 0.5,
    output: 1.5,
};

/// Adapter for OpenAI's Chat Completions API.
pub struct OpenAIProvider {
    api_key: String,
    default_model: String,
    default_max_tokens: u32,
    encoding: CoreBPE,
}

impl OpenAIProvider {
    /// Construct from the environment.
    ///
    /// Requires `OPENAI_API_KEY`; `OPENAI_MODEL` (default `gpt-4o-mini`) and
    /// `OPENAI_MAX_TOKENS` (default 2000) tune the per-request defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            OrchestratorError::ProviderFailure(
                "OPENAI_API_KEY environment variable is required".to_string(),
            )
        })?;
        Self::new(api_key)
    }

    /// Construct with an explicit API key; defaults still come from the
    /// environment.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let encoding = tiktoken_rs::cl100k_base().map_err(|e| {
            OrchestratorError::ProviderFailure(format!("Failed to load cl100k encoding: {}", e))
        })?;
        Ok(OpenAIProvider {
            api_key: api_key.into(),
            default_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            default_max_tokens: env_u32("OPENAI_MAX_TOKENS", 2000),
            encoding,
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAIProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);

        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &request.system_prompt {
            messages.push(json!({"role": "system", "content": system_prompt}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
        });

        let response = get_shared_http_client()
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                OrchestratorError::ProviderFailure(format!("OpenAI API error: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            OrchestratorError::ProviderFailure(format!("OpenAI API error: {}", e))
        })?;

        if !status.is_success() {
            if log::log_enabled!(log::Level::Error) {
                log::error!("OpenAIProvider::generate: HTTP {}: {}", status, text);
            }
            return Err(OrchestratorError::ProviderFailure(format!(
                "OpenAI API error: HTTP {}: {}",
                status, text
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            OrchestratorError::ProviderFailure(format!("OpenAI API error: {}", e))
        })?;

        let content = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let usage = parsed.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let output_tokens = usage
            .and_then(|u| u.get("completion_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let total_tokens = usage
            .and_then(|u| u.get("total_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(input_tokens + output_tokens);

        let cost = self.calculate_cost(input_tokens, output_tokens, &model);

        Ok(GenerationResult {
            content,
            input_tokens,
            output_tokens,
            total_tokens,
            cost,
            model,
        })
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.encoding.encode_with_special_tokens(text).len()
    }

    fn calculate_cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
        price_for(PRICING, model, &FALLBACK_PRICING).cost(input_tokens, output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new("test-key").unwrap()
    }

    #[test]
    fn prices_known_models() {
        let p = provider();
        let cost = p.calculate_cost(1_000_000, 1_000_000, "gpt-4o-mini");
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_models_price_as_gpt35_turbo() {
        let p = provider();
        let unknown = p.calculate_cost(500_000, 500_000, "gpt-unreleased");
        let gpt35 = p.calculate_cost(500_000, 500_000, "gpt-3.5-turbo");
        assert!((unknown - gpt35).abs() < 1e-9);
    }

    #[test]
    fn counts_tokens_with_cl100k() {
        let p = provider();
        assert!(p.count_tokens("hello world") >= 1);
        assert_eq!(p.count_tokens(""), 0);
    }
}
