//! Authoritative control-plane REST client.
//!
//! The control plane owns the canonical run/step records; this sink mirrors
//! the orchestrator's transitions into it with short timeouts. Failures are
//! logged and swallowed: the Redis shadow remains, and a separate sync
//! worker reconciles from it.

use std::time::Duration;

use async_trait::async_trait;

use crate::orchestrator::sync::{
    composite_step_id, RunUpdate, StateSink, StepRunCreate, StepUpdate,
};

/// Timeout for idempotent PATCH updates.
const UPDATE_TIMEOUT: Duration = Duration::from_secs(2);
/// Timeout for step-record creation.
const CREATE_TIMEOUT: Duration = Duration::from_secs(5);

/// REST sink against the control plane's `/api/v1` surface.
pub struct ControlPlaneSink {
    base_url: String,
    http: reqwest::Client,
}

impl ControlPlaneSink {
    /// Sink against `base_url`, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        ControlPlaneSink {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// The `{stepId}` path segment for a step-run id. Composite ids carry
    /// the step id after the `:step:` marker; an authoritative id is used
    /// as-is.
    fn step_path_id(step_run_id: &str) -> &str {
        match step_run_id.rfind(":step:") {
            Some(idx) => &step_run_id[idx + ":step:".len()..],
            None => step_run_id,
        }
    }
}

#[async_trait]
impl StateSink for ControlPlaneSink {
    async fn record_run_update(&self, run_id: &str, update: &RunUpdate) {
        let url = format!("{}/api/v1/runs/{}/status", self.base_url, run_id);
        let result = self
            .http
            .patch(&url)
            .timeout(UPDATE_TIMEOUT)
            .json(update)
            .send()
            .await;
        if let Err(e) = result {
            // The shadow path still has the update.
            log::warn!("state sync degraded: run update PATCH failed: {}", e);
        }
    }

    async fn create_step_run(&self, run_id: &str, create: &StepRunCreate) -> String {
        let url = format!("{}/api/v1/runs/{}/steps", self.base_url, run_id);
        let result = self
            .http
            .post(&url)
            .timeout(CREATE_TIMEOUT)
            .json(create)
            .send()
            .await;

        if let Ok(response) = result {
            if response.status() == reqwest::StatusCode::CREATED {
                if let Ok(body) = response.json::<serde_json::Value>().await {
                    if let Some(id) = body.get("id").and_then(|v| v.as_str()) {
                        return id.to_string();
                    }
                }
            }
        }

        composite_step_id(run_id, &create.step_id)
    }

    async fn record_step_update(&self, run_id: &str, step_run_id: &str, update: &StepUpdate) {
        let url = format!(
            "{}/api/v1/runs/{}/steps/{}",
            self.base_url,
            run_id,
            Self::step_path_id(step_run_id)
        );
        let result = self
            .http
            .patch(&url)
            .timeout(UPDATE_TIMEOUT)
            .json(update)
            .send()
            .await;
        if let Err(e) = result {
            log::warn!("state sync degraded: step update PATCH failed: {}", e);
        }
    }

    async fn record_approval(&self, _run_id: &str, _step_id: &str) {
        // Approval markers live only in the shadow store.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_ids_map_to_their_step_segment() {
        assert_eq!(ControlPlaneSink::step_path_id("r1:step:search"), "search");
        assert_eq!(ControlPlaneSink::step_path_id("srv-generated-77"), "srv-generated-77");
    }

    #[test]
    fn trailing_slashes_are_normalised() {
        let sink = ControlPlaneSink::new("http://localhost:3000/");
        assert_eq!(sink.base_url, "http://localhost:3000");
    }
}
