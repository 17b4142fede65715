//! HTTP surface.
//!
//! Three JSON endpoints: start a run, resume an approved run, and read a
//! run's latest status from the Redis shadow. Pipeline execution is
//! scheduled as a detached background task: `start` returns `accepted`
//! immediately and the run's progress is observable through the status
//! endpoint and the control plane.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use crate::orchestrator::pipeline::Pipeline;
use crate::orchestrator::runner::{PipelineOrchestrator, RunMode};
use crate::orchestrator::sync::RedisShadowSink;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Shadow store the status endpoint reads from; absent when Redis was
    /// unreachable at startup.
    pub shadow: Option<RedisShadowSink>,
}

/// Assemble the service router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/runs/{run_id}/start", post(start_run))
        .route("/runs/{run_id}/resume", post(resume_run))
        .route("/runs/{run_id}/status", get(run_status))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "service": "aic-orchestrator"}))
}

async fn start_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let (pipeline, inputs) = match parse_run_request(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    spawn_run(state, run_id.clone(), pipeline, inputs, RunMode::Start);

    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "accepted", "runId": run_id, "message": "Run started"})),
    )
        .into_response()
}

async fn resume_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let (pipeline, inputs) = match parse_run_request(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    if body.get("decision").and_then(|v| v.as_str()) != Some("approved") {
        return bad_request("Run not approved");
    }

    spawn_run(state, run_id.clone(), pipeline, inputs, RunMode::Resume);

    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "resumed", "runId": run_id, "message": "Run resumed"})),
    )
        .into_response()
}

async fn run_status(State(state): State<AppState>, Path(run_id): Path<String>) -> Json<Value> {
    let update = match &state.shadow {
        Some(shadow) => shadow.read_run_update(&run_id).await,
        None => None,
    };
    Json(update.unwrap_or_else(|| json!({"status": "unknown"})))
}

/// Validate a start/resume body: both `pipeline` and `inputs` must be
/// present (an empty inputs object is fine), and the pipeline must
/// deserialise.
fn parse_run_request(body: &Value) -> Result<(Pipeline, Map<String, Value>), Response> {
    let (pipeline, inputs) = match (body.get("pipeline"), body.get("inputs")) {
        (Some(pipeline), Some(inputs)) => (pipeline, inputs),
        _ => return Err(bad_request("Missing pipeline or inputs")),
    };

    let pipeline: Pipeline = match serde_json::from_value(pipeline.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => return Err(bad_request(&format!("Invalid pipeline: {}", e))),
    };

    let inputs = match inputs.as_object() {
        Some(map) => map.clone(),
        None => return Err(bad_request("Invalid inputs: expected an object")),
    };

    Ok((pipeline, inputs))
}

/// Schedule the run as a fire-and-forget background task; graph problems
/// and step failures surface through the state sink, not this response.
fn spawn_run(
    state: AppState,
    run_id: String,
    pipeline: Pipeline,
    inputs: Map<String, Value>,
    mode: RunMode,
) {
    tokio::spawn(async move {
        if let Err(e) = state
            .orchestrator
            .execute_pipeline(&run_id, &pipeline, inputs, mode)
            .await
        {
            if log::log_enabled!(log::Level::Error) {
                log::error!("run {}: {}", run_id, e);
            }
        }
    });
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::executor::StepExecutor;
    use crate::orchestrator::llm_service::LLMService;
    use crate::orchestrator::providers::MockProvider;
    use crate::orchestrator::sync::DualSink;
    use crate::orchestrator::tools::{ToolRegistry, WebSearchTool};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let llm = Arc::new(LLMService::mock_only(MockProvider::new()));
        let executor = StepExecutor::new(
            llm.clone(),
            ToolRegistry::new(WebSearchTool::new(None), Some(llm)),
        );
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            executor,
            Arc::new(DualSink::new(None, None)),
        ));
        build_router(AppState {
            orchestrator,
            shadow: None,
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_the_service_name() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "aic-orchestrator");
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn start_without_pipeline_is_rejected() {
        let response = test_router()
            .oneshot(post_json("/runs/r1/start", json!({"inputs": {}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing pipeline or inputs");
    }

    #[tokio::test]
    async fn start_accepts_empty_inputs() {
        let response = test_router()
            .oneshot(post_json(
                "/runs/r1/start",
                json!({
                    "pipeline": {"steps": {"nodes": [], "edges": []}},
                    "inputs": {}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["runId"], "r1");
        assert_eq!(body["message"], "Run started");
    }

    #[tokio::test]
    async fn resume_requires_an_approved_decision() {
        let response = test_router()
            .oneshot(post_json(
                "/runs/r1/resume",
                json!({
                    "pipeline": {"steps": {"nodes": [], "edges": []}},
                    "inputs": {},
                    "decision": "rejected"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Run not approved");
    }

    #[tokio::test]
    async fn resume_with_approval_is_rescheduled() {
        let response = test_router()
            .oneshot(post_json(
                "/runs/r1/resume",
                json!({
                    "pipeline": {"steps": {"nodes": [], "edges": []}},
                    "inputs": {},
                    "decision": "approved"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "resumed");
        assert_eq!(body["message"], "Run resumed");
    }

    #[tokio::test]
    async fn status_without_a_shadow_store_is_unknown() {
        let response = test_router()
            .oneshot(Request::get("/runs/r1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "unknown");
    }
}
