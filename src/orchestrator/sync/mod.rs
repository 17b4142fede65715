//! Two-channel state synchronisation.
//!
//! Every run-level and step-level mutation the orchestrator produces is
//! written through a [`StateSink`]. The production sink is [`DualSink`],
//! which fans each update out to the authoritative control-plane REST
//! service and a Redis shadow:
//!
//! ```text
//! PipelineOrchestrator
//!        ↓ (StateSink)
//!     DualSink
//!   ┌────┴─────────────┐
//!   ↓                  ↓
//! RedisShadowSink   ControlPlaneSink
//! (run:update:*,    (PATCH /runs/{id}/status,
//!  step_run:*,       POST  /runs/{id}/steps,
//!  approval:*)       PATCH /runs/{id}/steps/{stepId})
//! ```
//!
//! The shadow exists so a separate sync worker can reconcile the control
//! plane when the direct call failed. Neither path is ever fatal: a sink
//! degrades the observability guarantee, never the run.

pub mod control_plane;
pub mod redis_shadow;

pub use control_plane::ControlPlaneSink;
pub use redis_shadow::RedisShadowSink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Run lifecycle states as persisted on the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    NeedsApproval,
}

/// Step lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Partial update of a run record. Absent fields are left untouched by the
/// control plane (idempotent PATCH semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunUpdate {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// JSON-encoded final context of a completed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RunUpdate {
    /// Update carrying only a status transition.
    pub fn new(status: RunStatus) -> Self {
        RunUpdate {
            status,
            started_at: None,
            finished_at: None,
            outputs: None,
            cost: None,
            tokens_used: None,
            error_message: None,
        }
    }
}

/// Creation payload for a per-node step record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRunCreate {
    pub step_id: String,
    pub step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    pub status: StepStatus,
    pub order_index: usize,
    /// JSON-encoded context snapshot at creation time.
    pub inputs: String,
}

/// Partial update of a step record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    /// Re-snapshot of the context at the moment the step began running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<String>,
    /// JSON-encoded step output envelope, accounting keys stripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// The deterministic step-run identity used whenever the control plane did
/// not hand one back.
pub fn composite_step_id(run_id: &str, step_id: &str) -> String {
    format!("{}:step:{}", run_id, step_id)
}

/// Destination for run/step state transitions.
///
/// Every method is infallible from the orchestrator's point of view:
/// implementations log their own degradation and swallow errors, because
/// state sync must never abort a run.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Persist a run-level transition.
    async fn record_run_update(&self, run_id: &str, update: &RunUpdate);

    /// Create a step record, returning its identity. Implementations
    /// without an authoritative id return the composite
    /// `{runId}:step:{stepId}` form.
    async fn create_step_run(&self, run_id: &str, create: &StepRunCreate) -> String;

    /// Persist a step-level transition.
    async fn record_step_update(&self, run_id: &str, step_run_id: &str, update: &StepUpdate);

    /// Write the pending-approval marker for a suspended run.
    async fn record_approval(&self, run_id: &str, step_id: &str);
}

/// Production sink: Redis shadow plus authoritative control plane, both
/// optional so a partially configured deployment still runs.
pub struct DualSink {
    control_plane: Option<ControlPlaneSink>,
    shadow: Option<RedisShadowSink>,
}

impl DualSink {
    pub fn new(control_plane: Option<ControlPlaneSink>, shadow: Option<RedisShadowSink>) -> Self {
        DualSink {
            control_plane,
            shadow,
        }
    }
}

#[async_trait]
impl StateSink for DualSink {
    async fn record_run_update(&self, run_id: &str, update: &RunUpdate) {
        // Shadow first: it is the channel the sync worker reconciles from.
        if let Some(shadow) = &self.shadow {
            shadow.record_run_update(run_id, update).await;
        }
        if let Some(control_plane) = &self.control_plane {
            control_plane.record_run_update(run_id, update).await;
        }
    }

    async fn create_step_run(&self, run_id: &str, create: &StepRunCreate) -> String {
        match &self.control_plane {
            Some(control_plane) => control_plane.create_step_run(run_id, create).await,
            None => composite_step_id(run_id, &create.step_id),
        }
    }

    async fn record_step_update(&self, run_id: &str, step_run_id: &str, update: &StepUpdate) {
        if let Some(shadow) = &self.shadow {
            shadow.record_step_update(run_id, step_run_id, update).await;
        }
        if let Some(control_plane) = &self.control_plane {
            control_plane
                .record_step_update(run_id, step_run_id, update)
                .await;
        }
    }

    async fn record_approval(&self, run_id: &str, step_id: &str) {
        if let Some(shadow) = &self.shadow {
            shadow.record_approval(run_id, step_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composite_ids_follow_the_wire_format() {
        assert_eq!(composite_step_id("r1", "search"), "r1:step:search");
    }

    #[test]
    fn run_updates_serialise_camel_case_and_skip_absent_fields() {
        let mut update = RunUpdate::new(RunStatus::NeedsApproval);
        update.started_at = Some("2024-01-01T00:00:00Z".to_string());

        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({"status": "needs_approval", "startedAt": "2024-01-01T00:00:00Z"})
        );
    }

    #[test]
    fn step_updates_serialise_camel_case() {
        let update = StepUpdate {
            status: Some(StepStatus::Completed),
            tokens_used: Some(12),
            latency_ms: Some(40),
            ..StepUpdate::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({"status": "completed", "tokensUsed": 12, "latencyMs": 40})
        );
    }

    #[tokio::test]
    async fn empty_dual_sink_synthesises_composite_ids() {
        let sink = DualSink::new(None, None);
        let create = StepRunCreate {
            step_id: "a".to_string(),
            step_type: "agent".to_string(),
            tool_used: None,
            status: StepStatus::Pending,
            order_index: 0,
            inputs: "{}".to_string(),
        };
        assert_eq!(sink.create_step_run("r1", &create).await, "r1:step:a");
    }
}
