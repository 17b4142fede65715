//! Service-level configuration.
//!
//! Provider and tool credentials are read by their own constructors
//! (`LLMService::from_env`, `WebSearchTool::from_env`); this struct collects
//! the remaining process-level settings. All values have local-development
//! defaults, so the service boots with an empty environment, degraded to
//! the mock provider and fallback search but functional.

use crate::orchestrator::providers::common::env_or;

/// Process-level settings for the orchestrator service.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Redis instance backing the shadow state store.
    pub redis_url: String,
    /// Base URL of the control-plane REST service.
    pub api_url: String,
    /// Port the HTTP surface listens on.
    pub port: u16,
}

impl OrchestratorConfig {
    /// Read `REDIS_URL`, `API_URL`, and `PORT` from the environment.
    pub fn from_env() -> Self {
        OrchestratorConfig {
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            api_url: env_or("API_URL", "http://localhost:3000"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(8000),
        }
    }
}
