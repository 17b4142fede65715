//! Anthropic Claude provider adapter.
//!
//! Same outbound contract as the OpenAI adapter with the vendor differences
//! the Messages API imposes: the system prompt rides as a top-level field,
//! and `max_tokens` is mandatory. No exact tokeniser is available, so
//! [`ProviderClient::count_tokens`] approximates at four characters per
//! token.

use async_trait::async_trait;
use serde_json::json;

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::provider_client::{
    price_for, GenerationRequest, GenerationResult, ModelPricing, ProviderClient,
};
use crate::orchestrator::providers::common::{env_or, env_u32, get_shared_http_client};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// USD per 1M tokens (2024 list prices). Unknown models price at the
/// `claude-3-haiku-20240307` row.
const PRICING: &[(&str, ModelPricing)] = &[
    (
        "claude-3-5-sonnet-20241022",
        ModelPricing {
            input: 3.0,
            output: 15.0,
        },
    ),
    (
        "claude-3-opus-20240229",
        ModelPricing {
            input: 15.0,
            output: 75.0,
        },
    ),
    (
        "claude-3-sonnet-20240229",
        ModelPricing {
            input: 3.0,
            output: 15.0,
        },
    ),
    (
        "claude-3-haiku-20240307",
        ModelPricing {
            input: 0.25,
            output: 1.25,
        },
    ),
];

const FALLBACK_PRICING: ModelPricing = ModelPricing {
    input: 0.25,
    output: 1.25,
};

/// Adapter for Anthropic's Messages API.
pub struct AnthropicProvider {
    api_key: String,
    default_model: String,
    default_max_tokens: u32,
}

impl AnthropicProvider {
    /// Construct from the environment.
    ///
    /// Requires `ANTHROPIC_API_KEY`; `ANTHROPIC_MODEL` (default
    /// `claude-3-haiku-20240307`) and `ANTHROPIC_MAX_TOKENS` (default 2000)
    /// tune the per-request defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            OrchestratorError::ProviderFailure(
                "ANTHROPIC_API_KEY environment variable is required".to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    /// Construct with an explicit API key; defaults still come from the
    /// environment.
    pub fn new(api_key: impl Into<String>) -> Self {
        AnthropicProvider {
            api_key: api_key.into(),
            default_model: env_or("ANTHROPIC_MODEL", "claude-3-haiku-20240307"),
            default_max_tokens: env_u32("ANTHROPIC_MAX_TOKENS", 2000),
        }
    }
}

#[async_trait]
impl ProviderClient for AnthropicProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);

        let body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
            "system": request.system_prompt.as_deref().unwrap_or(""),
            "messages": [
                {"role": "user", "content": request.prompt}
            ],
        });

        let response = get_shared_http_client()
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                OrchestratorError::ProviderFailure(format!("Anthropic API error: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            OrchestratorError::ProviderFailure(format!("Anthropic API error: {}", e))
        })?;

        if !status.is_success() {
            if log::log_enabled!(log::Level::Error) {
                log::error!("AnthropicProvider::generate: HTTP {}: {}", status, text);
            }
            return Err(OrchestratorError::ProviderFailure(format!(
                "Anthropic API error: HTTP {}: {}",
                status, text
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            OrchestratorError::ProviderFailure(format!("Anthropic API error: {}", e))
        })?;

        let content = parsed
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        let usage = parsed.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let output_tokens = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let cost = self.calculate_cost(input_tokens, output_tokens, &model);

        Ok(GenerationResult {
            content,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost,
            model,
        })
    }

    fn count_tokens(&self, text: &str) -> usize {
        // Rough approximation: 4 characters per token.
        text.len() / 4
    }

    fn calculate_cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
        price_for(PRICING, model, &FALLBACK_PRICING).cost(input_tokens, output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_known_models() {
        let p = AnthropicProvider::new("test-key");
        let cost = p.calculate_cost(1_000_000, 1_000_000, "claude-3-opus-20240229");
        assert!((cost - 90.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_models_price_as_haiku() {
        let p = AnthropicProvider::new("test-key");
        let unknown = p.calculate_cost(400_000, 100_000, "claude-next");
        let haiku = p.calculate_cost(400_000, 100_000, "claude-3-haiku-20240307");
        assert!((unknown - haiku).abs() < 1e-9);
    }

    #[test]
    fn approximates_token_counts() {
        let p = AnthropicProvider::new("test-key");
        assert_eq!(p.count_tokens("12345678"), 2);
    }
}
