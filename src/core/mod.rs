//! The cognitive core: owns every subsystem and the external
//! collaborators, and exposes the single `solve` entry point the main
//! loop drives.
//!
//! Grounded on the teacher's aggregate-owns-subsystems shape (previously
//! `CognitiveLoop` owning its actors), generalised here to own plain
//! structs rather than supervised actors, since the concurrency model
//! (§5) runs one core single-threaded except for the sleep phase.

pub mod error;
pub mod types;

use rand::rngs::StdRng;
use rand::SeedableRng;
use ractor::Actor;
use tracing::{debug, info, warn};

use crate::aif::AifAgent;
use crate::circadian::sleep_actor::{ConceptSnapshot, ReplayRecord, SleepActor, SleepMessage};
use crate::circadian::{BatchEvent, CircadianClock};
use crate::config::Config;
use crate::emotion::EmotionState;
use crate::executor::strategy::StrategyStats;
use crate::executor::{self, ExecutorContext};
use crate::external::{CodeEvaluator, DeterministicSolver, LlmClient, PromptCache, Throttle};
use crate::gut::GutAggregator;
use crate::hdc::concept_memory::ConceptMemory;
use crate::hdc::encoder::Encoder;
use crate::memory::EbbinghausMemory;
use crate::promotion::PromotionPipeline;
use crate::resilience::supervisor::{Supervisor, SupervisorConfig};
use crate::scheduler::Scheduler;
pub use error::{CoreError, Result};

/// Supervisor identity for the sleep actor, restarted rather than
/// respawned anonymously each cycle so crash history accumulates per
/// actor across a whole night's cycles.
const SLEEP_ACTOR_ID: &str = "sleep_actor";

/// Everything one cognitive core owns: the state every solve mutates,
/// plus the external collaborators it calls out to. Nothing here is
/// shared with another `Core` instance.
pub struct Core {
    pub config: Config,
    encoder: Encoder,
    concepts: ConceptMemory,
    memory: EbbinghausMemory,
    aif: AifAgent,
    gut: GutAggregator,
    emotion: EmotionState,
    promotion: PromotionPipeline,
    scheduler: Scheduler,
    strategy_stats: StrategyStats,
    circadian: CircadianClock,
    throttle: Throttle,
    prompt_cache: PromptCache,
    llm: Box<dyn LlmClient>,
    evaluator: Box<dyn CodeEvaluator>,
    deterministic: Box<dyn DeterministicSolver>,
    rng: StdRng,
    previous_score: f32,
    streak: i32,
    supervisor: Supervisor,
}

impl Core {
    #[must_use]
    pub fn new(
        config: Config,
        memory_backend: Box<dyn crate::memory::VectorStoreBackend>,
        llm: Box<dyn LlmClient>,
        evaluator: Box<dyn CodeEvaluator>,
        deterministic: Box<dyn DeterministicSolver>,
    ) -> Self {
        Self {
            encoder: Encoder::new(config.tunables.hv_dim),
            concepts: ConceptMemory::new(),
            memory: EbbinghausMemory::new(memory_backend),
            aif: AifAgent::new(4, 4, vec![0, 1, 2, 3]),
            gut: GutAggregator::new(),
            emotion: EmotionState::new(),
            promotion: PromotionPipeline::new(),
            scheduler: Scheduler::new(),
            strategy_stats: StrategyStats::new(),
            circadian: CircadianClock::new(config.tunables.batches_per_day),
            throttle: Throttle::new(),
            prompt_cache: PromptCache::new(),
            llm,
            evaluator,
            deterministic,
            rng: StdRng::from_os_rng(),
            previous_score: 0.0,
            streak: 0,
            supervisor: Supervisor::new(SupervisorConfig::default()).expect("default supervisor config is valid"),
            config,
        }
    }

    /// Restore circadian and scheduler state from a [`crate::persistence::StateStore`].
    pub async fn restore_from(&mut self, store: &dyn crate::persistence::StateStore) -> Result<()> {
        if let Some(clock) = store.load_circadian().await? {
            self.circadian = clock;
        }
        if let Some(scheduler) = store.load_scheduler().await? {
            self.scheduler = scheduler;
        }
        Ok(())
    }

    /// Persist circadian and scheduler state to a [`crate::persistence::StateStore`].
    pub async fn checkpoint_to(&self, store: &dyn crate::persistence::StateStore) -> Result<()> {
        store.save_circadian(&self.circadian).await?;
        store.save_scheduler(&self.scheduler).await?;
        Ok(())
    }

    #[must_use]
    pub fn circadian_state(&self) -> crate::circadian::CircadianState {
        self.circadian.get_state()
    }

    /// Run one solve through the tiered executor, then advance the
    /// circadian clock by one batch.
    pub async fn solve(&mut self, task: &crate::core::types::Task) -> (crate::core::types::SolveResult, crate::core::types::SolveMetadata) {
        let now_seconds = self.circadian.get_state().batch_in_day as f64 * 60.0 + (self.circadian.get_state().day_number as f64 * 86_400.0);

        let mut ctx = ExecutorContext {
            encoder: &self.encoder,
            concepts: &mut self.concepts,
            memory: &mut self.memory,
            aif: &mut self.aif,
            gut: &mut self.gut,
            emotion: &mut self.emotion,
            promotion: &mut self.promotion,
            scheduler: &mut self.scheduler,
            strategy_stats: &mut self.strategy_stats,
            llm: self.llm.as_ref(),
            evaluator: self.evaluator.as_ref(),
            deterministic: self.deterministic.as_ref(),
            throttle: &mut self.throttle,
            prompt_cache: &mut self.prompt_cache,
            circadian: self.circadian.get_state(),
            now_seconds,
            previous_score: self.previous_score,
            streak: self.streak,
            toggles: self.config.toggles,
        };

        let (result, metadata) = executor::solve(&mut ctx, task, &mut self.rng).await;

        self.streak = if result.passed { self.streak.max(0) + 1 } else { 0 };
        self.previous_score = result.score;

        let event = BatchEvent {
            solved: result.passed,
            time_ms: metadata.total_elapsed.as_secs_f64() * 1000.0,
        };
        self.circadian.advance_batch(event);

        (result, metadata)
    }

    /// Run one NREM consolidation + REM dreaming pass over the current
    /// episodic records and concepts, applying the resulting strength
    /// adjustments back into memory. Intended to be called once per
    /// sleep phase from the main loop.
    pub async fn run_sleep_cycle(&mut self, consolidation_strength: f32, rem_intensity: f32) -> Result<usize> {
        self.supervisor.register_actor(SLEEP_ACTOR_ID);

        let mut applied = 0usize;
        let mut cycle = 0u32;

        while cycle < self.config.tunables.cycles_per_night {
            match self.run_one_sleep_pass(consolidation_strength, rem_intensity, cycle).await? {
                Some(pass_applied) => {
                    applied += pass_applied;
                    cycle += 1;
                }
                None => {
                    // Actor crashed and the supervisor granted a restart;
                    // retry this same cycle with a freshly spawned actor.
                }
            }
        }

        info!(applied, cycles = self.config.tunables.cycles_per_night, "sleep cycle complete");
        Ok(applied)
    }

    /// Spawn a fresh sleep actor, supervised under [`SLEEP_ACTOR_ID`], and
    /// run one NREM+REM pass. Returns `Ok(None)` when the actor crashed
    /// and the supervisor allowed a restart; `Err` when the restart limit
    /// was exceeded.
    async fn run_one_sleep_pass(&mut self, consolidation_strength: f32, rem_intensity: f32, cycle: u32) -> Result<Option<usize>> {
        let (actor, handle) = Actor::spawn(None, SleepActor, self.circadian.get_state().day_number as u64)
            .await
            .map_err(|e| CoreError::Sleep(e.to_string()))?;

        let records: Vec<ReplayRecord> = self
            .memory
            .all_ids()
            .into_iter()
            .filter_map(|id| self.memory.get(id))
            .map(|r| ReplayRecord {
                id,
                score: r.strength / crate::memory::MAX_STRENGTH,
                access_count: r.access_count as u32,
                strength: r.strength,
            })
            .collect();

        let adjustments = match ractor::call_t!(actor, |reply| SleepMessage::RunNrem { records, consolidation_strength, reply }, 5_000) {
            Ok(adjustments) => adjustments,
            Err(e) => return self.recover_from_actor_crash(actor, handle, cycle, e).await,
        };

        let mut applied = 0usize;
        for adjustment in adjustments {
            if self.memory.adjust_strength(adjustment.id, adjustment.multiplier, 0.1).await {
                applied += 1;
            }
        }

        let concepts: Vec<ConceptSnapshot> = self
            .concepts
            .names()
            .iter()
            .filter_map(|name| self.concepts.get(name))
            .map(|c| ConceptSnapshot {
                name: c.name.clone(),
                prototype: c.prototype.clone(),
                has_code: false,
            })
            .collect();

        if let Err(e) = ractor::call_t!(actor, |reply| SleepMessage::RunRem { concepts, rem_intensity, reply }, 5_000) {
            return self.recover_from_actor_crash(actor, handle, cycle, e).await;
        }

        actor.stop(None);
        handle.await.ok();

        debug!(cycle, "sleep cycle pass complete");
        Ok(Some(applied))
    }

    /// Report a sleep actor crash to the supervisor and translate its
    /// restart decision into this pass's result.
    async fn recover_from_actor_crash<E: std::fmt::Display>(&mut self, actor: ractor::ActorRef<SleepMessage>, handle: ractor::JoinHandle<()>, cycle: u32, err: E) -> Result<Option<usize>> {
        actor.stop(None);
        handle.await.ok();

        let reason = err.to_string();
        let should_restart = self.supervisor.report_crash(SLEEP_ACTOR_ID, &reason).map_err(|e| CoreError::Sleep(e.to_string()))?;
        if should_restart {
            warn!(cycle, reason = %reason, "sleep actor crashed, restarting for this cycle");
            self.supervisor.mark_restarted(SLEEP_ACTOR_ID).map_err(|e| CoreError::Sleep(e.to_string()))?;
            Ok(None)
        } else {
            Err(CoreError::Sleep(format!("sleep actor exceeded restart limit: {reason}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::types::Task;
    use crate::external::evaluator::EvalResult;
    use crate::external::llm::LlmOutcome;
    use crate::external::NullDeterministicSolver;
    use crate::memory::InMemoryBackend;

    struct AlwaysFailEvaluator;

    #[async_trait]
    impl CodeEvaluator for AlwaysFailEvaluator {
        async fn evaluate(&self, _task: &Task, _code: &str) -> EvalResult {
            EvalResult::runtime_failure()
        }
    }

    struct AlwaysFailLlm;

    #[async_trait]
    impl LlmClient for AlwaysFailLlm {
        async fn call(&self, _prompt: &str, _temperature: f32) -> LlmOutcome {
            LlmOutcome::Failed
        }
    }

    #[tokio::test]
    async fn solving_one_task_advances_the_circadian_clock() {
        let mut core = Core::new(Config::default(), Box::new(InMemoryBackend::new()), Box::new(AlwaysFailLlm), Box::new(AlwaysFailEvaluator), Box::new(NullDeterministicSolver));

        let before = core.circadian_state().batch_in_day;
        let task = Task::new("t", "reverse a string", "strings", 0.2);
        let _ = core.solve(&task).await;
        let after = core.circadian_state().batch_in_day;

        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn sleep_cycle_runs_cycles_per_night_passes() {
        async fn weak_record_strength_after_one_sleep(cycles_per_night: u32) -> f32 {
            let config = Config {
                tunables: crate::config::Tunables {
                    cycles_per_night,
                    ..crate::config::Tunables::default()
                },
                ..Config::default()
            };
            let mut core = Core::new(config, Box::new(InMemoryBackend::new()), Box::new(AlwaysFailLlm), Box::new(AlwaysFailEvaluator), Box::new(NullDeterministicSolver));

            let id = core.memory.store(vec![1.0, 0.0], "weak_concept", 0.5, crate::memory::RecordMetadata::new()).await;
            core.run_sleep_cycle(1.0, 0.3).await.expect("sleep cycle completes");
            core.memory.get(id).map_or(0.0, |r| r.strength)
        }

        let one_cycle = weak_record_strength_after_one_sleep(1).await;
        let three_cycles = weak_record_strength_after_one_sleep(3).await;

        assert!(three_cycles < one_cycle, "more NREM+REM passes should compound the weak record's decay: one={one_cycle} three={three_cycles}");
    }
}
