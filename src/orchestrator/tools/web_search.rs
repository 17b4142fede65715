//! Web search tool backed by the Tavily REST API.
//!
//! Without a `TAVILY_API_KEY` the tool degrades to a single canned fallback
//! result flagged `fallback: true`, so pipelines remain runnable offline.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::providers::common::get_shared_http_client;

const SEARCH_URL: &str = "https://api.tavily.com/search";

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Search response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchOutcome {
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// Tavily-backed web search.
pub struct WebSearchTool {
    api_key: Option<String>,
}

impl WebSearchTool {
    /// Read the search credential from `TAVILY_API_KEY`.
    pub fn from_env() -> Self {
        let api_key = std::env::var("TAVILY_API_KEY").ok();
        if api_key.is_none() {
            log::warn!("TAVILY_API_KEY not set. Web search will use fallback.");
        }
        WebSearchTool { api_key }
    }

    /// Construct with an explicit (or absent) credential.
    pub fn new(api_key: Option<String>) -> Self {
        WebSearchTool { api_key }
    }

    /// Run a search, returning up to `max_results` hits.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<SearchOutcome> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                // Fallback to basic search results.
                return Ok(SearchOutcome {
                    results: vec![SearchResult {
                        title: format!("Result for: {}", query),
                        url: "https://example.com".to_string(),
                        content: format!("Sample content related to {}", query),
                        score: 0.0,
                    }],
                    query: query.to_string(),
                    sources: Vec::new(),
                    fallback: true,
                });
            }
        };

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "advanced",
        });

        let response = get_shared_http_client()
            .post(SEARCH_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::ToolFailure(format!("Web search error: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OrchestratorError::ToolFailure(format!("Web search error: {}", e)))?;

        if !status.is_success() {
            return Err(OrchestratorError::ToolFailure(format!(
                "Web search error: HTTP {}: {}",
                status, text
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| OrchestratorError::ToolFailure(format!("Web search error: {}", e)))?;

        let results: Vec<SearchResult> = parsed
            .get("results")
            .and_then(|r| r.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| SearchResult {
                        title: item
                            .get("title")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        url: item
                            .get("url")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        content: item
                            .get("content")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        score: item.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let sources = results.iter().map(|r| r.url.clone()).collect();

        Ok(SearchOutcome {
            results,
            query: query.to_string(),
            sources,
            fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_yields_flagged_fallback() {
        let tool = WebSearchTool::new(None);
        let outcome = tool.search("rust orms", 5).await.unwrap();

        assert!(outcome.fallback);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].title, "Result for: rust orms");
        assert!(outcome.results[0].content.contains("rust orms"));
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn fallback_flag_is_omitted_when_false() {
        let outcome = SearchOutcome {
            results: Vec::new(),
            query: "q".to_string(),
            sources: Vec::new(),
            fallback: false,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(value.get("fallback").is_none());
    }

    #[test]
    fn outcome_parses_from_json_strings() {
        let raw = r#"{"results":[{"title":"Acme - CRM","url":"https://acme.io","content":"c"}],"query":"q"}"#;
        let outcome: SearchOutcome = serde_json::from_str(raw).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].score, 0.0);
    }
}
