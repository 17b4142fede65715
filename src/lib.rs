// src/lib.rs

// Import the top-level `orchestrator` module.
pub mod orchestrator;

// Re-exporting key items for easier external access.
pub use orchestrator::error::{OrchestratorError, Result};
pub use orchestrator::executor::StepExecutor;
pub use orchestrator::llm_service::LLMService;
pub use orchestrator::pipeline::{Edge, Node, NodeKind, Pipeline, Policies, StepGraph};
pub use orchestrator::runner::{PipelineOrchestrator, RunMode, RunOutcome};
pub use orchestrator::sync::StateSink;

/// Initialise the process-wide logger.
///
/// Safe to call multiple times; only the first call wins. Defaults to `info`
/// when `RUST_LOG` is not set.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
