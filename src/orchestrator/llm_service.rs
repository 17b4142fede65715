//! Provider registry and prompt dispatch.
//!
//! [`LLMService`] owns the set of initialised provider adapters and routes
//! each agent-step prompt to the right one. Vendor adapters are constructed
//! at startup only when their credential environment variable is present; a
//! construction failure logs a warning and the service keeps going. The
//! mock adapter is always present, so `provider = "auto"` never fails even
//! on a machine with no secrets configured.

use std::sync::Arc;

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::provider_client::{GenerationRequest, GenerationResult, ProviderClient};
use crate::orchestrator::providers::{AnthropicProvider, MockProvider, OpenAIProvider};

/// Registry of initialised provider adapters.
pub struct LLMService {
    openai: Option<Arc<OpenAIProvider>>,
    anthropic: Option<Arc<AnthropicProvider>>,
    mock: Arc<MockProvider>,
}

impl LLMService {
    /// Initialise adapters from the environment.
    ///
    /// `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` gate their adapters; a failed
    /// construction is logged and skipped rather than aborting startup.
    pub fn from_env() -> Self {
        let openai = if std::env::var("OPENAI_API_KEY").is_ok() {
            match OpenAIProvider::from_env() {
                Ok(provider) => Some(Arc::new(provider)),
                Err(e) => {
                    log::warn!("Could not initialize OpenAI: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let anthropic = if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            match AnthropicProvider::from_env() {
                Ok(provider) => Some(Arc::new(provider)),
                Err(e) => {
                    log::warn!("Could not initialize Anthropic: {}", e);
                    None
                }
            }
        } else {
            None
        };

        LLMService {
            openai,
            anthropic,
            mock: Arc::new(MockProvider::new()),
        }
    }

    /// Service backed only by the given mock adapter. Used by tests that
    /// need deterministic completions.
    pub fn mock_only(mock: MockProvider) -> Self {
        LLMService {
            openai: None,
            anthropic: None,
            mock: Arc::new(mock),
        }
    }

    /// Whether a real (non-mock) vendor adapter is available.
    pub fn has_vendor_adapter(&self) -> bool {
        self.openai.is_some() || self.anthropic.is_some()
    }

    /// Dispatch a prompt to the named provider.
    ///
    /// `"auto"` resolves to the first available of OpenAI, Anthropic, mock.
    /// Naming an uninitialised vendor fails with `ProviderUnavailable`;
    /// naming anything unrecognised fails with `ProviderUnknown`.
    ///
    /// The prompt is expected to be fully interpolated already; the step
    /// executor performs the single interpolation pass.
    pub async fn generate(
        &self,
        prompt: &str,
        provider: &str,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: f64,
        system_prompt: Option<String>,
    ) -> Result<GenerationResult> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            model,
            max_tokens,
            temperature,
            system_prompt,
        };

        let provider = if provider == "auto" {
            if self.openai.is_some() {
                "openai"
            } else if self.anthropic.is_some() {
                "anthropic"
            } else {
                // Fall back to the zero-cost mock provider.
                "mock"
            }
        } else {
            provider
        };

        match provider {
            "openai" => match &self.openai {
                Some(adapter) => adapter.generate(&request).await,
                None => Err(OrchestratorError::ProviderUnavailable("OpenAI".to_string())),
            },
            "anthropic" => match &self.anthropic {
                Some(adapter) => adapter.generate(&request).await,
                None => Err(OrchestratorError::ProviderUnavailable(
                    "Anthropic".to_string(),
                )),
            },
            "mock" => self.mock.generate(&request).await,
            other => Err(OrchestratorError::ProviderUnknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> LLMService {
        LLMService::mock_only(MockProvider::new())
    }

    #[tokio::test]
    async fn auto_falls_back_to_mock_without_credentials() {
        let result = service()
            .generate("Hi", "auto", None, None, 0.7, None)
            .await
            .unwrap();
        assert_eq!(result.model, "mock-llm");
        assert!(result.content.starts_with("MOCK LLM RESPONSE"));
    }

    #[tokio::test]
    async fn mock_always_succeeds() {
        let result = service()
            .generate("Hi", "mock", None, None, 0.7, None)
            .await
            .unwrap();
        assert_eq!(result.cost, 0.0);
    }

    #[tokio::test]
    async fn uninitialised_vendor_is_unavailable() {
        let err = service()
            .generate("Hi", "openai", None, None, 0.7, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OpenAI provider not initialized");
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let err = service()
            .generate("Hi", "cohere", None, None, 0.7, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown provider: cohere");
    }
}
