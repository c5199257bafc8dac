//! The code-evaluator external collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::types::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub passed: u32,
    pub total: u32,
    pub score: f32,
    pub feedback: String,
    pub execution_time_ms: f64,
}

impl EvalResult {
    /// A synthetic failing result for the "eval exception" error-handling
    /// row: score 0, feedback "runtime".
    #[must_use]
    pub fn runtime_failure() -> Self {
        Self {
            passed: 0,
            total: 0,
            score: 0.0,
            feedback: "runtime".to_string(),
            execution_time_ms: 0.0,
        }
    }

    #[must_use]
    pub fn is_exact_pass(&self) -> bool {
        self.total > 0 && self.passed == self.total && (self.score - 1.0).abs() < f32::EPSILON
    }

    /// True if the feedback string names one of the fixed failure-class
    /// tokens the core parses, per §6.
    #[must_use]
    pub fn mentions(&self, token: &str) -> bool {
        self.feedback.to_lowercase().contains(token)
    }
}

/// Deterministic task execution: `evaluate(task, code)` must return the
/// same result for the same `(task, code)` pair.
#[async_trait]
pub trait CodeEvaluator: Send + Sync {
    async fn evaluate(&self, task: &Task, code: &str) -> EvalResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pass_requires_full_score_and_total() {
        let result = EvalResult {
            passed: 3,
            total: 3,
            score: 1.0,
            feedback: "ok".to_string(),
            execution_time_ms: 1.0,
        };
        assert!(result.is_exact_pass());
    }

    #[test]
    fn partial_pass_is_not_exact() {
        let result = EvalResult {
            passed: 2,
            total: 3,
            score: 0.66,
            feedback: "index error on case 3".to_string(),
            execution_time_ms: 1.0,
        };
        assert!(!result.is_exact_pass());
        assert!(result.mentions("index"));
    }

    #[test]
    fn runtime_failure_is_sentinel_zero() {
        let result = EvalResult::runtime_failure();
        assert_eq!(result.score, 0.0);
        assert!(result.mentions("runtime"));
    }
}
