//! Step execution.
//!
//! [`StepExecutor`] runs one node of any kind against the appropriate
//! back-end and shapes its output envelope:
//!
//! - **tool** nodes are policy-checked and delegated to the
//!   [`ToolRegistry`], their raw result keys namespaced with the node id so
//!   parallel branches cannot clobber each other in the shared context;
//! - **agent** nodes get their prompt interpolated once against the live
//!   context and dispatched to the [`LLMService`]; JSON-looking completions
//!   are parsed so downstream templates can address into them;
//! - **condition** nodes are evaluated by the configured
//!   [`ConditionEvaluator`];
//! - **approval** nodes have no body; suspension is the orchestrator's job.
//!
//! Every failure is wrapped into `StepFailed` carrying the node id.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::orchestrator::condition::{AlwaysTrueEvaluator, ConditionEvaluator};
use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::llm_service::LLMService;
use crate::orchestrator::pipeline::{Node, NodeKind, Policies};
use crate::orchestrator::template;
use crate::orchestrator::tools::ToolRegistry;

/// Executes individual pipeline steps.
pub struct StepExecutor {
    llm_service: Arc<LLMService>,
    tool_registry: ToolRegistry,
    condition_evaluator: Arc<dyn ConditionEvaluator>,
}

impl StepExecutor {
    /// Executor over the given service, with tools and the always-true
    /// condition evaluator wired in.
    pub fn new(llm_service: Arc<LLMService>, tool_registry: ToolRegistry) -> Self {
        StepExecutor {
            llm_service,
            tool_registry,
            condition_evaluator: Arc::new(AlwaysTrueEvaluator),
        }
    }

    /// Executor with environment-derived tool credentials.
    pub fn from_env(llm_service: Arc<LLMService>) -> Self {
        let tool_registry = ToolRegistry::from_env(Some(llm_service.clone()));
        Self::new(llm_service, tool_registry)
    }

    /// Swap in a different condition evaluator.
    pub fn with_condition_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.condition_evaluator = evaluator;
        self
    }

    /// Execute a single pipeline step against the current context.
    pub async fn execute_step(
        &self,
        node: &Node,
        ctx: &Map<String, Value>,
        policies: &Policies,
    ) -> Result<Map<String, Value>> {
        self.dispatch(node, ctx, policies)
            .await
            .map_err(|e| e.into_step_failure(&node.id))
    }

    async fn dispatch(
        &self,
        node: &Node,
        ctx: &Map<String, Value>,
        policies: &Policies,
    ) -> Result<Map<String, Value>> {
        match node.kind {
            NodeKind::Tool => self.execute_tool_step(node, ctx, policies).await,
            NodeKind::Agent => self.execute_agent_step(node, ctx).await,
            NodeKind::Condition => self.execute_condition_step(node, ctx),
            // No body; the orchestrator owns the suspension.
            NodeKind::Approval => Ok(Map::new()),
        }
    }

    async fn execute_tool_step(
        &self,
        node: &Node,
        ctx: &Map<String, Value>,
        policies: &Policies,
    ) -> Result<Map<String, Value>> {
        let tool_name = node.tool_name();

        if !policies.allows_tool(tool_name) {
            return Err(OrchestratorError::ToolDenied(tool_name.to_string()));
        }

        let result = self
            .tool_registry
            .execute_tool(tool_name, &node.config, ctx)
            .await?;

        Ok(namespace_keys(&node.id, result))
    }

    async fn execute_agent_step(
        &self,
        node: &Node,
        ctx: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let prompt_template = node.config_str("prompt").unwrap_or("Analyze the input");
        let prompt = template::interpolate(prompt_template, ctx);

        let provider = node.config_str("provider").unwrap_or("auto");
        let model = node.config_str("model").map(|s| s.to_string());
        let max_tokens = node
            .config
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);
        let temperature = node
            .config
            .get("temperature")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.7);
        let system_prompt = node.config_str("system_prompt").map(|s| s.to_string());

        let result = self
            .llm_service
            .generate(&prompt, provider, model, max_tokens, temperature, system_prompt)
            .await?;

        // JSON-looking completions are stored structured so downstream
        // templates can address into them.
        let trimmed = result.content.trim();
        let output = if trimmed.starts_with('{') || trimmed.starts_with('[') {
            serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(result.content.clone()))
        } else {
            Value::String(result.content.clone())
        };

        let mut envelope = Map::new();
        envelope.insert(format!("{}_output", node.id), output);
        envelope.insert("content".to_string(), Value::String(result.content));
        envelope.insert("input_tokens".to_string(), Value::from(result.input_tokens));
        envelope.insert(
            "output_tokens".to_string(),
            Value::from(result.output_tokens),
        );
        envelope.insert("total_tokens".to_string(), Value::from(result.total_tokens));
        envelope.insert("cost".to_string(), Value::from(result.cost));
        envelope.insert("model".to_string(), Value::String(result.model));
        Ok(envelope)
    }

    fn execute_condition_step(
        &self,
        node: &Node,
        ctx: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let condition = node.config_str("condition").unwrap_or("true");
        let result = self.condition_evaluator.evaluate(condition, ctx)?;

        let mut envelope = Map::new();
        envelope.insert("condition_result".to_string(), Value::Bool(result));
        envelope.insert("condition".to_string(), Value::String(condition.to_string()));
        Ok(envelope)
    }
}

/// Prefix every key with `{node_id}_` unless it already carries the prefix.
fn namespace_keys(node_id: &str, raw: Map<String, Value>) -> Map<String, Value> {
    let prefix = format!("{}_", node_id);
    raw.into_iter()
        .map(|(key, value)| {
            if key.starts_with(&prefix) {
                (key, value)
            } else {
                (format!("{}{}", prefix, key), value)
            }
        })
        .collect()
}
