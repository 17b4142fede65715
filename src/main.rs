// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use aic_orchestrator::init_logger;
use aic_orchestrator::orchestrator::config::OrchestratorConfig;
use aic_orchestrator::orchestrator::executor::StepExecutor;
use aic_orchestrator::orchestrator::llm_service::LLMService;
use aic_orchestrator::orchestrator::runner::PipelineOrchestrator;
use aic_orchestrator::orchestrator::server::{build_router, AppState};
use aic_orchestrator::orchestrator::sync::{ControlPlaneSink, DualSink, RedisShadowSink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_logger();

    let config = OrchestratorConfig::from_env();

    // Redis being down must not keep the service from booting; the
    // control-plane path still records every transition.
    let shadow = match RedisShadowSink::connect(&config.redis_url).await {
        Ok(shadow) => Some(shadow),
        Err(e) => {
            log::warn!("Redis unavailable, shadow sync disabled: {}", e);
            None
        }
    };

    let sink = Arc::new(DualSink::new(
        Some(ControlPlaneSink::new(config.api_url.clone())),
        shadow.clone(),
    ));

    let llm_service = Arc::new(LLMService::from_env());
    let executor = StepExecutor::from_env(llm_service);
    let orchestrator = Arc::new(PipelineOrchestrator::new(executor, sink));

    let app = build_router(AppState {
        orchestrator,
        shadow,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("aic-orchestrator listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
