//! Pluggable predicate evaluation for condition nodes.
//!
//! The default evaluator accepts every condition, mirroring the behaviour
//! this engine replaces: condition nodes record their expression and a
//! `condition_result` of `true` without gating anything. Deployments that
//! want real predicates opt in to [`ExpressionEvaluator`], which
//! interpolates the expression against the run context and evaluates it as
//! a boolean with `evalexpr`.

use serde_json::{Map, Value};

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::template;

/// Evaluates a condition node's expression against the run context.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &str, ctx: &Map<String, Value>) -> Result<bool>;
}

/// Accepts every condition. The default.
pub struct AlwaysTrueEvaluator;

impl ConditionEvaluator for AlwaysTrueEvaluator {
    fn evaluate(&self, _condition: &str, _ctx: &Map<String, Value>) -> Result<bool> {
        Ok(true)
    }
}

/// Boolean expression evaluation via `evalexpr`.
///
/// Placeholders are interpolated first, so `{{score}} > 3` works when an
/// upstream step produced a numeric `score`. A malformed or non-boolean
/// expression fails the step.
pub struct ExpressionEvaluator;

impl ConditionEvaluator for ExpressionEvaluator {
    fn evaluate(&self, condition: &str, ctx: &Map<String, Value>) -> Result<bool> {
        let resolved = template::interpolate(condition, ctx);
        evalexpr::eval_boolean(&resolved).map_err(|e| {
            OrchestratorError::PipelineMalformed(format!(
                "Invalid condition expression '{}': {}",
                resolved, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn always_true_accepts_anything() {
        let ctx = Map::new();
        assert!(AlwaysTrueEvaluator.evaluate("false", &ctx).unwrap());
        assert!(AlwaysTrueEvaluator.evaluate("garbage ===", &ctx).unwrap());
    }

    #[test]
    fn expression_evaluator_interpolates_then_evaluates() {
        let ctx = json!({"score": 5}).as_object().unwrap().clone();
        assert!(ExpressionEvaluator.evaluate("{{score}} > 3", &ctx).unwrap());
        assert!(!ExpressionEvaluator.evaluate("{{score}} > 9", &ctx).unwrap());
    }

    #[test]
    fn expression_evaluator_rejects_garbage() {
        let ctx = Map::new();
        let err = ExpressionEvaluator.evaluate("not an expression ===", &ctx);
        assert!(err.is_err());
    }
}
