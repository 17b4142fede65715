//! Redis shadow of run/step state.
//!
//! Mirrors every transition under TTL'd keys so a sync worker can reconcile
//! the control plane when the direct REST call failed, and so the HTTP
//! status endpoint can answer without touching the control plane:
//!
//! - `run:update:{runId}`: latest run transition, 1 h TTL.
//! - `step_run:{runId}:step:{stepId}`: latest step transition, 1 h TTL.
//! - `approval:{runId}:{stepId}`: pending-approval marker, 24 h TTL.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;

use crate::orchestrator::sync::{
    composite_step_id, RunUpdate, StateSink, StepRunCreate, StepUpdate,
};

const RUN_UPDATE_TTL_SECS: u64 = 3600;
const STEP_UPDATE_TTL_SECS: u64 = 3600;
const APPROVAL_TTL_SECS: u64 = 86400;

/// Shadow sink over a shared Redis connection.
///
/// The connection manager multiplexes and reconnects internally, so the
/// sink can be cloned freely across run tasks.
#[derive(Clone)]
pub struct RedisShadowSink {
    manager: ConnectionManager,
}

impl RedisShadowSink {
    pub fn new(manager: ConnectionManager) -> Self {
        RedisShadowSink { manager }
    }

    /// Connect to `redis_url` and wrap the managed connection.
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(RedisShadowSink::new(manager))
    }

    /// The latest run transition, as served by the status endpoint.
    pub async fn read_run_update(&self, run_id: &str) -> Option<serde_json::Value> {
        let mut conn = self.manager.clone();
        let key = format!("run:update:{}", run_id);
        let raw: Option<String> = match conn.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("state sync degraded: shadow read failed: {}", e);
                None
            }
        };
        raw.and_then(|body| serde_json::from_str(&body).ok())
    }

    async fn set_json<T: Serialize>(&self, key: String, payload: &T, ttl_secs: u64) {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                log::warn!("state sync degraded: shadow serialisation failed: {}", e);
                return;
            }
        };
        let mut conn = self.manager.clone();
        let result: redis::RedisResult<()> = conn.set_ex(&key, body, ttl_secs).await;
        if let Err(e) = result {
            log::warn!("state sync degraded: shadow write failed: {}", e);
        }
    }
}

#[async_trait]
impl StateSink for RedisShadowSink {
    async fn record_run_update(&self, run_id: &str, update: &RunUpdate) {
        self.set_json(format!("run:update:{}", run_id), update, RUN_UPDATE_TTL_SECS)
            .await;
    }

    async fn create_step_run(&self, run_id: &str, create: &StepRunCreate) -> String {
        // Step records are created on the control plane; the shadow only
        // mirrors subsequent transitions.
        composite_step_id(run_id, &create.step_id)
    }

    async fn record_step_update(&self, _run_id: &str, step_run_id: &str, update: &StepUpdate) {
        self.set_json(
            format!("step_run:{}", step_run_id),
            update,
            STEP_UPDATE_TTL_SECS,
        )
        .await;
    }

    async fn record_approval(&self, run_id: &str, step_id: &str) {
        self.set_json(
            format!("approval:{}:{}", run_id, step_id),
            &serde_json::json!({"decision": "pending"}),
            APPROVAL_TTL_SECS,
        )
        .await;
    }
}
