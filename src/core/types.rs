//! Core types shared across the cognitive subsystems: the unit of work
//! (`Task`), the outcome of one solve (`SolveResult`, `SolveMetadata`),
//! and the strategies the tiered executor can choose between.
//!
//! Grounded on the teacher's `Thought`/`SalienceScore` builder style
//! (typed id newtype, `with_*` builders, `Default`/`neutral()` constructors)
//! applied to the spec's solve-loop data model instead of thought assembly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One programming-task prompt, along with the test cases the evaluator
/// checks it against and the category/difficulty metadata the gut and
/// promotion pipeline key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Normalised difficulty in `[0, 1]`.
    pub difficulty: f32,
    pub test_cases: Vec<TestCase>,
}

impl Task {
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>, category: impl Into<String>, difficulty: f32) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: description.into(),
            category: category.into(),
            difficulty: difficulty.clamp(0.0, 1.0),
            test_cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_test_cases(mut self, cases: Vec<TestCase>) -> Self {
        self.test_cases = cases;
        self
    }

    /// Normalised description used for fingerprinting: lowercase,
    /// whitespace collapsed.
    #[must_use]
    pub fn normalised_description(&self) -> String {
        self.description.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// One of the executor's named strategies, each tracked with a rolling
/// `(attempts, successes)` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    DeterministicS0,
    PromotedS0,
    MemoryS1,
    PromotedS1,
    Direct,
    WithHints,
    FromMemory,
    StepByStep,
}

impl Strategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DeterministicS0 => "deterministic_S0",
            Strategy::PromotedS0 => "promoted_S0",
            Strategy::MemoryS1 => "memory_S1",
            Strategy::PromotedS1 => "promoted_S1",
            Strategy::Direct => "direct",
            Strategy::WithHints => "with_hints",
            Strategy::FromMemory => "from_memory",
            Strategy::StepByStep => "step_by_step",
        }
    }

    #[must_use]
    pub const fn all() -> [Strategy; 8] {
        [
            Strategy::DeterministicS0,
            Strategy::PromotedS0,
            Strategy::MemoryS1,
            Strategy::PromotedS1,
            Strategy::Direct,
            Strategy::WithHints,
            Strategy::FromMemory,
            Strategy::StepByStep,
        ]
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tier a strategy belongs to, used by the promotion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    S0,
    S1,
    S2,
}

/// The code (if any) and score produced by one attempt within a solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: Strategy,
    pub code: String,
    pub score: f32,
    pub feedback: String,
    pub elapsed: Duration,
    pub reflected: bool,
}

/// The final outcome of one `solve(task)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    pub task_id: TaskId,
    pub code: String,
    pub score: f32,
    pub passed: bool,
    pub feedback: String,
}

/// Diagnostic metadata returned alongside [`SolveResult`], per the
/// contract in §4.4: winning tier, attempts used, per-tier timings,
/// concept name, gut recommendation, AIF surprise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveMetadata {
    pub winning_strategy: String,
    pub attempts_used: u32,
    pub concept_name: String,
    pub concept_is_new: bool,
    pub concept_similarity: f32,
    pub gut_recommendation: String,
    pub aif_surprise: f32,
    pub total_elapsed: Duration,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn normalised_description_collapses_whitespace_and_case() {
        let task = Task::new("t", "  Read   Two\nIntegers  ", "io", 0.1);
        assert_eq!(task.normalised_description(), "read two integers");
    }

    #[test]
    fn strategy_round_trips_through_display() {
        for s in Strategy::all() {
            assert_eq!(s.as_str(), s.to_string());
        }
    }

    #[test]
    fn task_difficulty_is_clamped() {
        let task = Task::new("t", "d", "c", 5.0);
        assert_eq!(task.difficulty, 1.0);
    }
}
