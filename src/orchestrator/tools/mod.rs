//! Built-in tool implementations and the registry that dispatches them.
//!
//! Tool steps name a tool; the registry interpolates the step config against
//! the live run context (so configs can reference upstream outputs with
//! `{{placeholders}}`), invokes the tool, and shapes the raw result into the
//! tool's output envelope.
//!
//! # Available tools
//!
//! - **web_search**: Tavily-backed web search with an offline fallback.
//! - **competitor_analysis**: heuristic competitor extraction over search
//!   results, optionally refined by an LLM.

pub mod competitor_analysis;
pub mod web_search;

pub use competitor_analysis::{AnalysisOutcome, Competitor, CompetitorAnalysisTool};
pub use web_search::{SearchOutcome, SearchResult, WebSearchTool};

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::llm_service::LLMService;
use crate::orchestrator::template;

/// Named tool dispatch with config interpolation and result shaping.
pub struct ToolRegistry {
    web_search: Arc<WebSearchTool>,
    competitor_analysis: CompetitorAnalysisTool,
}

impl ToolRegistry {
    /// Build a registry around an explicit search tool.
    pub fn new(web_search: WebSearchTool, llm_service: Option<Arc<LLMService>>) -> Self {
        let web_search = Arc::new(web_search);
        ToolRegistry {
            competitor_analysis: CompetitorAnalysisTool::new(web_search.clone(), llm_service),
            web_search,
        }
    }

    /// Registry with environment-derived credentials.
    pub fn from_env(llm_service: Option<Arc<LLMService>>) -> Self {
        Self::new(WebSearchTool::from_env(), llm_service)
    }

    /// Execute a tool by name.
    ///
    /// The config is recursively interpolated against `ctx` before dispatch.
    /// Unknown tool names fail with `ToolUnknown`; policy enforcement happens
    /// upstream in the step executor, before this call.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        config: &Map<String, Value>,
        ctx: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let config = template::interpolate_map(config, ctx);

        match tool_name {
            "web_search" => {
                let query = config
                    .get("query")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let max_results = config
                    .get("max_results")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(5) as u32;

                let outcome = self.web_search.search(&query, max_results).await?;

                let mut envelope = Map::new();
                envelope.insert("query".to_string(), Value::String(query));
                envelope.insert(
                    "sources".to_string(),
                    serde_json::to_value(&outcome.sources).unwrap_or(Value::Null),
                );
                envelope.insert(
                    "result".to_string(),
                    serde_json::to_value(&outcome).unwrap_or(Value::Null),
                );
                Ok(envelope)
            }

            "competitor_analysis" => {
                let idea = config
                    .get("idea")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let search_results = parse_search_results(config.get("searchResults"));

                let outcome = self.competitor_analysis.analyze(&idea, search_results).await?;

                let mut envelope = Map::new();
                envelope.insert("competitors".to_string(), outcome.competitors.clone());
                envelope.insert(
                    "analysis".to_string(),
                    outcome
                        .analysis
                        .clone()
                        .unwrap_or_else(|| Value::String(String::new())),
                );
                envelope.insert(
                    "result".to_string(),
                    serde_json::to_value(&outcome).unwrap_or(Value::Null),
                );
                Ok(envelope)
            }

            other => Err(OrchestratorError::ToolUnknown(other.to_string())),
        }
    }
}

/// Upstream steps may hand search results over as a JSON string or as the
/// structured object; anything unparsable is treated as absent so the tool
/// falls back to its own search.
fn parse_search_results(value: Option<&Value>) -> Option<SearchOutcome> {
    match value {
        Some(Value::String(raw)) => serde_json::from_str(raw).ok(),
        Some(other @ Value::Object(_)) => serde_json::from_value(other.clone()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(WebSearchTool::new(None), None)
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn unknown_tools_are_rejected() {
        let err = registry()
            .execute_tool("launch_rocket", &Map::new(), &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: launch_rocket");
    }

    #[tokio::test]
    async fn web_search_config_is_interpolated() {
        let config = obj(json!({"query": "{{topic}} pricing"}));
        let ctx = obj(json!({"topic": "vector dbs"}));

        let envelope = registry()
            .execute_tool("web_search", &config, &ctx)
            .await
            .unwrap();
        assert_eq!(envelope["query"], "vector dbs pricing");
        assert_eq!(envelope["result"]["fallback"], true);
    }

    #[tokio::test]
    async fn competitor_analysis_parses_string_search_results() {
        let raw = json!({
            "results": [{"title": "Acme - CRM", "url": "https://acme.io", "content": "c", "score": 1.0}],
            "query": "q"
        })
        .to_string();
        let config = obj(json!({"idea": "ai crm", "searchResults": raw}));

        let envelope = registry()
            .execute_tool("competitor_analysis", &config, &Map::new())
            .await
            .unwrap();
        assert_eq!(envelope["competitors"][0]["name"], "Acme");
        assert_eq!(envelope["analysis"], "");
    }

    #[tokio::test]
    async fn unparsable_search_results_fall_back_to_search() {
        let config = obj(json!({"idea": "ai crm", "searchResults": "not json"}));

        let envelope = registry()
            .execute_tool("competitor_analysis", &config, &Map::new())
            .await
            .unwrap();
        // The tool searched on its own and mined the fallback hit.
        assert_eq!(envelope["result"]["llm_enhanced"], false);
        assert!(envelope["competitors"].as_array().is_some());
    }
}
