//! End-to-end run orchestration.
//!
//! [`PipelineOrchestrator`] drives one run: it validates and linearises the
//! graph, creates the per-step records, walks the order delegating each node
//! to the [`StepExecutor`], aggregates cost/token totals, and emits every
//! status transition through the [`StateSink`], without knowing whether the
//! sink writes one store or two.
//!
//! Within a run, nodes execute strictly sequentially in topological order.
//! Concurrency exists only across runs: the HTTP layer spawns one detached
//! task per run.
//!
//! Approval nodes suspend the run (`needs_approval`) and leave downstream
//! steps pending. A resume request triggers a fresh execution-order walk in
//! [`RunMode::Resume`], in which approval gates complete instead of
//! suspending.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::orchestrator::error::Result;
use crate::orchestrator::executor::StepExecutor;
use crate::orchestrator::pipeline::{Node, NodeKind, Pipeline};
use crate::orchestrator::scheduler::execution_order;
use crate::orchestrator::sync::{
    RunStatus, RunUpdate, StateSink, StepRunCreate, StepStatus, StepUpdate,
};

/// Keys carried in step envelopes purely for accounting. Stripped from the
/// persisted outputs and from the context merged into downstream steps.
const ACCOUNTING_KEYS: &[&str] = &[
    "cost",
    "input_tokens",
    "output_tokens",
    "total_tokens",
    "model",
];

/// Whether this walk starts a run or resumes one past its approval gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Start,
    Resume,
}

/// Terminal state of a successful `execute_pipeline` call.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every node completed; `outputs` is the final context envelope.
    Completed { outputs: Map<String, Value> },
    /// The run suspended at an approval gate.
    NeedsApproval { step_id: String },
}

/// Orchestrates pipeline execution.
pub struct PipelineOrchestrator {
    executor: StepExecutor,
    sink: Arc<dyn StateSink>,
}

impl PipelineOrchestrator {
    pub fn new(executor: StepExecutor, sink: Arc<dyn StateSink>) -> Self {
        PipelineOrchestrator { executor, sink }
    }

    /// Drive one run to a terminal state (or to an approval suspension).
    ///
    /// Step failures abort the run and propagate; state-sync problems never
    /// do.
    pub async fn execute_pipeline(
        &self,
        run_id: &str,
        pipeline: &Pipeline,
        inputs: Map<String, Value>,
        mode: RunMode,
    ) -> Result<RunOutcome> {
        let mut update = RunUpdate::new(RunStatus::Running);
        update.started_at = Some(now());
        self.sink.record_run_update(run_id, &update).await;

        let order = match execution_order(&pipeline.steps) {
            Ok(order) => order,
            Err(e) => {
                // Rejected before any step record exists.
                let mut update = RunUpdate::new(RunStatus::Failed);
                update.error_message = Some(e.to_string());
                update.finished_at = Some(now());
                self.sink.record_run_update(run_id, &update).await;
                return Err(e);
            }
        };

        let nodes: HashMap<&str, &Node> = pipeline
            .steps
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect();

        let mut ctx = inputs;
        let mut total_cost = 0.0_f64;
        let mut total_tokens = 0_u64;

        // Pending records for the whole order, snapshotting the initial
        // context; the snapshot is refreshed when each step starts running.
        let mut step_run_ids: HashMap<&str, String> = HashMap::with_capacity(order.len());
        for (idx, step_id) in order.iter().enumerate() {
            let node = nodes[step_id.as_str()];
            let create = StepRunCreate {
                step_id: step_id.clone(),
                step_type: node.kind.as_str().to_string(),
                tool_used: match node.kind {
                    NodeKind::Tool => node.config_str("tool").map(|s| s.to_string()),
                    _ => None,
                },
                status: StepStatus::Pending,
                order_index: idx,
                inputs: encode(&ctx),
            };
            let step_run_id = self.sink.create_step_run(run_id, &create).await;
            step_run_ids.insert(step_id.as_str(), step_run_id);
        }

        for step_id in &order {
            let node = nodes[step_id.as_str()];
            let step_run_id = &step_run_ids[step_id.as_str()];

            let mut running = StepUpdate::default();
            running.status = Some(StepStatus::Running);
            running.started_at = Some(now());
            running.inputs = Some(encode(&ctx));
            self.sink
                .record_step_update(run_id, step_run_id, &running)
                .await;

            if node.kind == NodeKind::Approval && mode == RunMode::Start {
                // Pause execution until approval; downstream steps stay pending.
                self.sink
                    .record_run_update(run_id, &RunUpdate::new(RunStatus::NeedsApproval))
                    .await;
                self.sink.record_approval(run_id, step_id).await;
                return Ok(RunOutcome::NeedsApproval {
                    step_id: step_id.clone(),
                });
            }

            let timer = Instant::now();
            match self
                .executor
                .execute_step(node, &ctx, &pipeline.policies)
                .await
            {
                Ok(output) => {
                    let latency_ms = timer.elapsed().as_millis() as u64;
                    let cost = output.get("cost").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    let tokens = extract_tokens(&output);
                    let stripped = strip_accounting_keys(output);

                    total_cost += cost;
                    total_tokens += tokens;

                    let mut completed = StepUpdate::default();
                    completed.status = Some(StepStatus::Completed);
                    completed.outputs = Some(encode(&stripped));
                    completed.cost = Some(cost);
                    completed.tokens_used = Some(tokens);
                    completed.latency_ms = Some(latency_ms);
                    completed.finished_at = Some(now());
                    self.sink
                        .record_step_update(run_id, step_run_id, &completed)
                        .await;

                    // Later keys overwrite earlier ones.
                    ctx.extend(stripped);
                }
                Err(e) => {
                    let mut failed = StepUpdate::default();
                    failed.status = Some(StepStatus::Failed);
                    failed.error_message = Some(e.step_message());
                    failed.finished_at = Some(now());
                    self.sink
                        .record_step_update(run_id, step_run_id, &failed)
                        .await;

                    let mut update = RunUpdate::new(RunStatus::Failed);
                    update.error_message = Some(e.to_string());
                    update.finished_at = Some(now());
                    self.sink.record_run_update(run_id, &update).await;

                    return Err(e);
                }
            }
        }

        let mut update = RunUpdate::new(RunStatus::Completed);
        update.outputs = Some(encode(&ctx));
        update.cost = Some(total_cost);
        update.tokens_used = Some(total_tokens);
        update.finished_at = Some(now());
        self.sink.record_run_update(run_id, &update).await;

        Ok(RunOutcome::Completed { outputs: ctx })
    }
}

/// Tokens billed for a step: `total_tokens`, else `output_tokens`, else 0.
fn extract_tokens(output: &Map<String, Value>) -> u64 {
    output
        .get("total_tokens")
        .and_then(|v| v.as_u64())
        .or_else(|| output.get("output_tokens").and_then(|v| v.as_u64()))
        .unwrap_or(0)
}

// Rebuilds the map rather than removing in place: removal would reorder the
// remaining keys, and context insertion order is an observable contract for
// template fallback resolution.
fn strip_accounting_keys(output: Map<String, Value>) -> Map<String, Value> {
    output
        .into_iter()
        .filter(|(key, _)| !ACCOUNTING_KEYS.contains(&key.as_str()))
        .collect()
}

fn encode(ctx: &Map<String, Value>) -> String {
    serde_json::to_string(ctx).unwrap_or_else(|_| "{}".to_string())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn token_extraction_prefers_totals() {
        assert_eq!(
            extract_tokens(&obj(json!({"total_tokens": 9, "output_tokens": 4}))),
            9
        );
        assert_eq!(extract_tokens(&obj(json!({"output_tokens": 4}))), 4);
        assert_eq!(extract_tokens(&obj(json!({}))), 0);
    }

    #[test]
    fn accounting_keys_are_stripped() {
        let stripped = strip_accounting_keys(obj(json!({
            "a_output": "x",
            "content": "x",
            "cost": 0.5,
            "input_tokens": 1,
            "output_tokens": 2,
            "total_tokens": 3,
            "model": "gpt-4o"
        })));
        assert_eq!(stripped, obj(json!({"a_output": "x", "content": "x"})));
    }
}
