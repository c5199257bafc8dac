//! End-to-end: a deterministic-solver hit wins outright and the
//! generative tier is never reached.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cascade_core::aif::AifAgent;
use cascade_core::circadian::CircadianClock;
use cascade_core::core::types::Task;
use cascade_core::emotion::EmotionState;
use cascade_core::config::ModuleToggles;
use cascade_core::executor::strategy::StrategyStats;
use cascade_core::executor::{solve, ExecutorContext};
use cascade_core::external::evaluator::EvalResult;
use cascade_core::external::llm::{LlmOutcome, PromptCache, Throttle};
use cascade_core::external::{CodeEvaluator, DeterministicSolver, LlmClient};
use cascade_core::gut::GutAggregator;
use cascade_core::hdc::concept_memory::ConceptMemory;
use cascade_core::hdc::encoder::Encoder;
use cascade_core::memory::{EbbinghausMemory, InMemoryBackend};
use cascade_core::promotion::PromotionPipeline;
use cascade_core::scheduler::Scheduler;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

struct ExactSolver;

#[async_trait]
impl DeterministicSolver for ExactSolver {
    async fn solve(&self, _task: &Task) -> Option<String> {
        Some("print('hello world')".to_string())
    }
}

struct ExactEvaluator;

#[async_trait]
impl CodeEvaluator for ExactEvaluator {
    async fn evaluate(&self, _task: &Task, _code: &str) -> EvalResult {
        EvalResult {
            passed: 1,
            total: 1,
            score: 1.0,
            feedback: "ok".to_string(),
            execution_time_ms: 2.0,
        }
    }
}

#[derive(Default)]
struct CountingLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for CountingLlm {
    async fn call(&self, _prompt: &str, _temperature: f32) -> LlmOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        LlmOutcome::Text("```python\nprint(1)\n```".to_string())
    }
}

#[tokio::test]
async fn deterministic_hit_wins_without_touching_the_generative_tier() {
    let encoder = Encoder::new(64);
    let mut concepts = ConceptMemory::new();
    let mut memory = EbbinghausMemory::new(Box::new(InMemoryBackend::new()));
    let mut aif = AifAgent::new(4, 4, vec![0, 1, 2, 3]);
    let mut gut = GutAggregator::new();
    let mut emotion = EmotionState::new();
    let mut promotion = PromotionPipeline::new();
    let mut scheduler = Scheduler::new();
    let mut strategy_stats = StrategyStats::new();
    let mut throttle = Throttle::new();
    let mut prompt_cache = PromptCache::new();

    let llm = CountingLlm::default();
    let evaluator = ExactEvaluator;
    let deterministic = ExactSolver;

    let task = Task::new("greet", "print a greeting to standard output", "io", 0.1);

    let mut ctx = ExecutorContext {
        encoder: &encoder,
        concepts: &mut concepts,
        memory: &mut memory,
        aif: &mut aif,
        gut: &mut gut,
        emotion: &mut emotion,
        promotion: &mut promotion,
        scheduler: &mut scheduler,
        strategy_stats: &mut strategy_stats,
        llm: &llm,
        evaluator: &evaluator,
        deterministic: &deterministic,
        throttle: &mut throttle,
        prompt_cache: &mut prompt_cache,
        circadian: CircadianClock::new(48).get_state(),
        now_seconds: 0.0,
        previous_score: 0.0,
        streak: 0,
        toggles: ModuleToggles::default(),
    };

    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let (result, metadata) = solve(&mut ctx, &task, &mut rng).await;

    assert!(result.passed);
    assert_eq!(result.score, 1.0);
    assert_eq!(metadata.winning_strategy, "deterministic_S0");
    assert_eq!(metadata.attempts_used, 1);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0, "the generative tier must never be reached on an S0 win");
}
