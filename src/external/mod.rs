//! External collaborator interfaces: everything outside the core's own
//! state that a solve touches (LLM, evaluator) plus the throttling and
//! caching wrapped around the LLM edge.
//!
//! Grounded on the teacher's `api` client trait boundary pattern and
//! `api::rate_limit`'s counter/backoff shape, generalised from a
//! Redis-backed distributed limiter to a single in-process adaptive gap
//! since the core is single-threaded per the concurrency model.

pub mod evaluator;
pub mod llm;
pub mod tasks;

use async_trait::async_trait;

use crate::core::types::Task;

pub use evaluator::{CodeEvaluator, EvalResult};
pub use llm::{LlmClient, LlmOutcome, PromptCache, Throttle};
pub use tasks::{StaticTaskSource, TaskSource};

/// The deterministic solver consulted first in the solve loop (§4.4 step
/// 5): given a task, return exact code if the task matches a known
/// closed-form pattern, or `None`.
#[async_trait]
pub trait DeterministicSolver: Send + Sync {
    async fn solve(&self, task: &Task) -> Option<String>;
}

/// A `DeterministicSolver` that never recognises anything, used when no
/// deterministic backend is configured.
pub struct NullDeterministicSolver;

#[async_trait]
impl DeterministicSolver for NullDeterministicSolver {
    async fn solve(&self, _task: &Task) -> Option<String> {
        None
    }
}

/// An `LlmClient` that never reaches a real model, standing in for the
/// HTTP client until one is wired up.
pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn call(&self, _prompt: &str, _temperature: f32) -> LlmOutcome {
        LlmOutcome::Failed
    }
}

/// A `CodeEvaluator` that fails every attempt, standing in for the
/// sandboxed runner until one is wired up.
pub struct NullCodeEvaluator;

#[async_trait]
impl CodeEvaluator for NullCodeEvaluator {
    async fn evaluate(&self, _task: &Task, _code: &str) -> EvalResult {
        EvalResult::runtime_failure()
    }
}
