//! Error taxonomy for pipeline execution.
//!
//! Every failure the orchestrator can surface is a variant of
//! [`OrchestratorError`]. Configuration and policy problems
//! (`ToolUnknown`, `ToolDenied`, `ProviderUnknown`, `ProviderUnavailable`)
//! and downstream back-end problems (`ProviderFailure`, `ToolFailure`) are
//! wrapped into [`OrchestratorError::StepFailed`] by the step executor, so a
//! run always fails with a message naming the offending node. Graph problems
//! (`PipelineMalformed`, `PipelineCyclic`) are raised before any step record
//! is created.
//!
//! State-sync degradation is not represented here: failures talking to the
//! control plane or Redis are logged and swallowed by the sink layer and
//! never abort a run.

use std::error::Error;
use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All failures the pipeline engine can produce.
#[derive(Debug, Clone)]
pub enum OrchestratorError {
    /// An edge references a node id that is not declared, or a node id is
    /// declared twice. Detected during scheduling, before any step mutation.
    PipelineMalformed(String),
    /// The step graph contains at least one cycle.
    PipelineCyclic,
    /// A tool step named a tool the registry does not know.
    ToolUnknown(String),
    /// A tool step named a tool excluded by the pipeline's `allowedTools` policy.
    ToolDenied(String),
    /// An agent step named a provider the service does not know.
    ProviderUnknown(String),
    /// An agent step named a provider whose adapter was never initialised
    /// (missing credentials at startup).
    ProviderUnavailable(String),
    /// The upstream model vendor returned an error.
    ProviderFailure(String),
    /// A tool back-end returned an error.
    ToolFailure(String),
    /// Any of the above, wrapped with the id of the node that raised it.
    StepFailed {
        node_id: String,
        source: Box<OrchestratorError>,
    },
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::PipelineMalformed(msg) => write!(f, "{}", msg),
            OrchestratorError::PipelineCyclic => write!(f, "Pipeline DAG contains cycles"),
            OrchestratorError::ToolUnknown(name) => write!(f, "Unknown tool: {}", name),
            OrchestratorError::ToolDenied(name) => {
                write!(f, "Tool {} is not allowed by policy", name)
            }
            OrchestratorError::ProviderUnknown(name) => write!(f, "Unknown provider: {}", name),
            OrchestratorError::ProviderUnavailable(name) => {
                write!(f, "{} provider not initialized", name)
            }
            OrchestratorError::ProviderFailure(msg) => write!(f, "{}", msg),
            OrchestratorError::ToolFailure(msg) => write!(f, "{}", msg),
            OrchestratorError::StepFailed { node_id, source } => {
                write!(f, "Step {} failed: {}", node_id, source)
            }
        }
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OrchestratorError::StepFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl OrchestratorError {
    /// Wrap any error with the id of the node it occurred in.
    ///
    /// Already-wrapped errors are returned unchanged so nesting a step
    /// failure inside another step failure is impossible.
    pub fn into_step_failure(self, node_id: &str) -> OrchestratorError {
        match self {
            err @ OrchestratorError::StepFailed { .. } => err,
            other => OrchestratorError::StepFailed {
                node_id: node_id.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The message persisted on the step record: the cause without the
    /// `"Step {id} failed:"` prefix the run-level message carries.
    pub fn step_message(&self) -> String {
        match self {
            OrchestratorError::StepFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}
