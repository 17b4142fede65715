//! Competitor analysis tool.
//!
//! Extracts candidate competitors from web search results with a cheap
//! heuristic, then asks a model to refine the list into a structured
//! analysis when an LLM service is configured. The model's answer is only
//! trusted when it contains a parseable fenced JSON block; anything else
//! keeps the heuristic competitors and stores the raw answer as the
//! analysis text. LLM failures degrade to the heuristic result rather than
//! failing the step.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::orchestrator::error::Result;
use crate::orchestrator::llm_service::LLMService;
use crate::orchestrator::tools::web_search::{SearchOutcome, WebSearchTool};

lazy_static! {
    /// Fenced ```json { ... } ``` block in a model response.
    static ref JSON_BLOCK: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid json-block regex");
}

/// How many search hits are mined for candidates.
const CANDIDATE_LIMIT: usize = 5;

/// One heuristically extracted competitor.
#[derive(Debug, Clone, Serialize)]
pub struct Competitor {
    pub name: String,
    pub description: String,
    pub source: String,
}

/// Analysis envelope returned by the tool.
///
/// `competitors` stays loosely typed because an LLM overlay may replace the
/// heuristic entries with its own richer shape.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub idea: String,
    pub competitors: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    pub sources: Vec<String>,
    pub llm_enhanced: bool,
}

/// Competitor analysis over web search results.
pub struct CompetitorAnalysisTool {
    web_search: Arc<WebSearchTool>,
    llm_service: Option<Arc<LLMService>>,
}

impl CompetitorAnalysisTool {
    pub fn new(web_search: Arc<WebSearchTool>, llm_service: Option<Arc<LLMService>>) -> Self {
        CompetitorAnalysisTool {
            web_search,
            llm_service,
        }
    }

    /// Analyse competitors for `idea`, searching the web when the caller did
    /// not supply results.
    pub async fn analyze(
        &self,
        idea: &str,
        search_results: Option<SearchOutcome>,
    ) -> Result<AnalysisOutcome> {
        let search_results = match search_results {
            Some(results) => results,
            None => {
                let query = format!("{} competitors alternatives market analysis", idea);
                self.web_search.search(&query, 10).await?
            }
        };

        let (competitors, sources) = extract_candidates(&search_results);

        if let Some(llm_service) = &self.llm_service {
            if !competitors.is_empty() {
                match self
                    .refine_with_llm(llm_service, idea, &competitors, &sources)
                    .await
                {
                    Ok(outcome) => return Ok(outcome),
                    Err(e) => {
                        log::warn!("LLM competitor analysis failed: {}", e);
                    }
                }
            }
        }

        Ok(AnalysisOutcome {
            idea: idea.to_string(),
            competitors: serde_json::to_value(&competitors).unwrap_or(Value::Null),
            analysis: None,
            sources,
            llm_enhanced: false,
        })
    }

    async fn refine_with_llm(
        &self,
        llm_service: &LLMService,
        idea: &str,
        competitors: &[Competitor],
        sources: &[String],
    ) -> Result<AnalysisOutcome> {
        let competitors_json =
            serde_json::to_string_pretty(competitors).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Analyze the following startup idea and its competitors:\n\n\
             Idea: {}\n\n\
             Competitors found:\n{}\n\n\
             Provide a structured competitor analysis with:\n\
             1. Direct competitors (products solving the same problem)\n\
             2. Indirect competitors (alternative solutions)\n\
             3. Market gaps and opportunities\n\n\
             Format the response as JSON with competitors array and analysis.",
            idea, competitors_json
        );

        let result = llm_service
            .generate(
                &prompt,
                "auto",
                None,
                Some(2000),
                0.7,
                Some(
                    "You are a competitive intelligence analyst. Provide structured, actionable insights."
                        .to_string(),
                ),
            )
            .await?;

        let heuristic = serde_json::to_value(competitors).unwrap_or(Value::Null);

        // Prefer a fenced JSON block; otherwise keep the heuristic
        // competitors and store the whole answer as the analysis.
        if let Some(caps) = JSON_BLOCK.captures(&result.content) {
            if let Ok(data) = serde_json::from_str::<Value>(&caps[1]) {
                return Ok(AnalysisOutcome {
                    idea: idea.to_string(),
                    competitors: data.get("competitors").cloned().unwrap_or(heuristic),
                    analysis: Some(
                        data.get("analysis")
                            .cloned()
                            .unwrap_or_else(|| Value::String(result.content.clone())),
                    ),
                    sources: sources.to_vec(),
                    llm_enhanced: true,
                });
            }
        }

        Ok(AnalysisOutcome {
            idea: idea.to_string(),
            competitors: heuristic,
            analysis: Some(Value::String(result.content)),
            sources: sources.to_vec(),
            llm_enhanced: true,
        })
    }
}

/// Mine the first few search hits for competitor names: the part of the
/// title before the first `-`, or the first 50 characters when there is no
/// dash. Duplicate names are dropped.
fn extract_candidates(search_results: &SearchOutcome) -> (Vec<Competitor>, Vec<String>) {
    let mut competitors: Vec<Competitor> = Vec::new();
    let mut sources = Vec::new();

    for result in search_results.results.iter().take(CANDIDATE_LIMIT) {
        let name = if result.title.contains('-') {
            result
                .title
                .split('-')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        } else {
            result.title.chars().take(50).collect()
        };

        if name.is_empty() || competitors.iter().any(|c| c.name == name) {
            continue;
        }

        competitors.push(Competitor {
            name,
            description: result.content.chars().take(200).collect(),
            source: result.url.clone(),
        });
        sources.push(result.url.clone());
    }

    (competitors, sources)
}
