//! Shared primitives for vendor-agnostic LLM provider adapters.
//!
//! The orchestrator interacts with model vendors exclusively through the
//! [`ProviderClient`] trait and the request/result types in this module. The
//! trait abstracts over concrete vendor implementations while the supporting
//! structs describe a single prompt dispatch and its token/cost accounting.
//!
//! # Basic request/response
//!
//! ```rust
//! use aic_orchestrator::orchestrator::provider_client::{GenerationRequest, ProviderClient};
//! use aic_orchestrator::orchestrator::providers::mock::MockProvider;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let provider = MockProvider::new();
//! let result = provider
//!     .generate(&GenerationRequest::new("Who are you?"))
//!     .await
//!     .unwrap();
//! assert_eq!(result.model, "mock-llm");
//! assert_eq!(result.cost, 0.0);
//! # });
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::orchestrator::error::Result;

/// One prompt dispatch to a provider.
///
/// `model` and `max_tokens` fall back to the adapter's environment-derived
/// defaults when absent. `temperature` defaults to `0.7`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fully interpolated user prompt. Placeholders were resolved by the
    /// step executor; adapters never re-interpolate.
    pub prompt: String,
    /// Vendor model identifier, e.g. `"gpt-4o-mini"`.
    pub model: Option<String>,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Optional system priming message.
    pub system_prompt: Option<String>,
}

impl GenerationRequest {
    /// Request with default model, token cap, and temperature.
    pub fn new(prompt: impl Into<String>) -> Self {
        GenerationRequest {
            prompt: prompt.into(),
            model: None,
            max_tokens: None,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

/// Accounted result of a provider call.
///
/// Token counts are the vendor-reported values where the API exposes them;
/// `cost` is computed from the adapter's pricing table in USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Assistant message body.
    pub content: String,
    /// Prompt-side tokens billed by the vendor.
    pub input_tokens: u64,
    /// Completion-side tokens billed by the vendor.
    pub output_tokens: u64,
    /// Convenience total.
    pub total_tokens: u64,
    /// USD cost of the call.
    pub cost: f64,
    /// Model that actually served the request.
    pub model: String,
}

/// Trait-driven abstraction for a concrete model vendor.
///
/// Implementations translate a [`GenerationRequest`] into the vendor wire
/// format and return responses in the uniform [`GenerationResult`] shape.
/// All implementations must be thread-safe (`Send + Sync`) so they can be
/// shared between concurrently executing runs.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Dispatch one prompt and return the accounted completion.
    ///
    /// Vendor errors surface as
    /// [`ProviderFailure`](crate::orchestrator::error::OrchestratorError::ProviderFailure)
    /// carrying the underlying message.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Count the tokens `text` would occupy in this vendor's encoding.
    ///
    /// Adapters without an exact tokeniser may approximate.
    fn count_tokens(&self, text: &str) -> usize;

    /// USD cost for a call with the given token split against `model`.
    fn calculate_cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> f64;
}

/// USD price per million tokens for one model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

impl ModelPricing {
    /// Price a call: `tokens / 1M * rate`, input and output summed.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input
            + (output_tokens as f64 / 1_000_000.0) * self.output
    }
}

/// Look up `model` in a pricing table, falling back to the table's default
/// row for unknown models.
pub fn price_for<'a>(
    table: &'a [(&'a str, ModelPricing)],
    model: &str,
    fallback: &'a ModelPricing,
) -> &'a ModelPricing {
    table
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, pricing)| pricing)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[(&str, ModelPricing)] = &[(
        "gpt-4o",
        ModelPricing {
            input: 2.5,
            output: 10.0,
        },
    )];

    const FALLBACK: ModelPricing = ModelPricing {
        input: 0.5,
        output: 1.5,
    };

    #[test]
    fn known_models_use_their_row() {
        let pricing = price_for(TABLE, "gpt-4o", &FALLBACK);
        assert!((pricing.cost(1_000_000, 1_000_000) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_models_use_the_fallback_row() {
        let pricing = price_for(TABLE, "gpt-9000", &FALLBACK);
        assert!((pricing.cost(2_000_000, 0) - 1.0).abs() < 1e-9);
    }
}
