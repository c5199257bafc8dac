//! Tiered dual-process solve loop: deterministic → cached procedural →
//! generative, with reflection retry.
//!
//! Grounded on the teacher's `cognitive_loop` orchestration pattern (a
//! sequence of cheap checks before an expensive external call, with a
//! single state-update cascade after the winning step), generalised from
//! assembling a `Thought` to producing a `SolveResult`.

pub mod reflection;
pub mod strategy;

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::aif::AifAgent;
use crate::circadian::CircadianState;
use crate::config::ModuleToggles;
use crate::core::types::{Attempt, SolveMetadata, SolveResult, Strategy, Task, Tier};
use crate::emotion::{EmotionState, ErrorClass, SolveOutcome};
use crate::external::{CodeEvaluator, DeterministicSolver, EvalResult, LlmClient, LlmOutcome, PromptCache, Throttle};
use crate::gut::{GutAggregator, Recommendation, SignalInputs};
use crate::hdc::concept_memory::ConceptMemory;
use crate::hdc::encoder::Encoder;
use crate::hdc::hypervector::Hypervector;
use crate::memory::EbbinghausMemory;
use crate::promotion::PromotionPipeline;
use crate::scheduler::Scheduler;
use strategy::StrategyStats;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const HARD_DIFFICULTY_THRESHOLD: f32 = 0.7;
pub const S1_SIMILARITY_THRESHOLD: f32 = 0.5;
const KNOWN_HARD_CATEGORIES: &[&str] = &["knapsack", "edit_distance", "edit distance"];

/// The S2 candidate strategies, in the order the AIF agent's action
/// indices map onto.
const S2_STRATEGIES: [Strategy; 4] = [Strategy::Direct, Strategy::WithHints, Strategy::FromMemory, Strategy::StepByStep];

/// Borrowed handles to every subsystem a solve touches, assembled by
/// `Core` for the duration of one `solve` call. No subsystem here holds a
/// reference to another; `Core` is the only owner.
pub struct ExecutorContext<'a> {
    pub encoder: &'a Encoder,
    pub concepts: &'a mut ConceptMemory,
    pub memory: &'a mut EbbinghausMemory,
    pub aif: &'a mut AifAgent,
    pub gut: &'a mut GutAggregator,
    pub emotion: &'a mut EmotionState,
    pub promotion: &'a mut PromotionPipeline,
    pub scheduler: &'a mut Scheduler,
    pub strategy_stats: &'a mut StrategyStats,
    pub llm: &'a dyn LlmClient,
    pub evaluator: &'a dyn CodeEvaluator,
    pub deterministic: &'a dyn DeterministicSolver,
    pub throttle: &'a mut Throttle,
    pub prompt_cache: &'a mut PromptCache,
    pub circadian: CircadianState,
    pub now_seconds: f64,
    pub previous_score: f32,
    pub streak: i32,
    /// Checked at the start of every subsystem call below; a disabled
    /// module is bypassed entirely rather than merely muted.
    pub toggles: ModuleToggles,
}

fn classify_task(ctx: &ExecutorContext<'_>, hv: &Hypervector, task: &Task) -> (String, bool, f32) {
    if !ctx.toggles.hdc {
        // Concept memory is bypassed entirely: every task looks unfamiliar,
        // keyed only by its category rather than a learned prototype.
        return (task.category.clone(), true, 0.0);
    }
    let (_, similarity, existing_name) = ctx.concepts.classify(hv);
    let is_new = existing_name.is_empty() || similarity < ctx.concepts.new_concept_threshold();
    let concept_name = if is_new {
        format!("{}_{:x}", task.category.replace(' ', "_"), fnv(&task.normalised_description()))
    } else {
        existing_name
    };
    (concept_name, is_new, similarity)
}

fn fnv(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for b in text.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn text_complexity(text: &str) -> f32 {
    let words = text.split_whitespace().count() as f32;
    ((words / 60.0) - 0.5).clamp(-1.0, 1.0)
}

/// Gather the six gut signals for this task given the current perception.
fn gather_gut_signals(ctx: &ExecutorContext<'_>, task: &Task, similarity: f32, is_new: bool, memory_hits: &[crate::memory::RecallHit]) -> SignalInputs {
    let familiarity = if is_new { -0.3 } else { 2.0 * similarity - 1.0 };

    let track_record = {
        let tally = ctx.strategy_stats.tally(Strategy::DeterministicS0);
        2.0 * tally.success_rate() - 1.0
    };

    let momentum = {
        let base = 2.0 * ctx.previous_score - 1.0;
        (base + (ctx.streak as f32 * 0.05)).clamp(-1.0, 1.0)
    };

    let complexity = text_complexity(&task.description) + task.difficulty * 0.3;

    let memory_strength = if memory_hits.is_empty() {
        0.0
    } else {
        let avg_retention = memory_hits.iter().map(|h| h.retention).sum::<f32>() / memory_hits.len() as f32;
        2.0 * avg_retention - 1.0
    };

    let energy = if ctx.toggles.aif {
        let surprise_term = (ctx.aif.get_surprise() / 3.0).tanh();
        (surprise_term - ctx.aif.belief().exploration_weight).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    SignalInputs {
        familiarity,
        track_record,
        momentum,
        complexity: complexity.clamp(-1.0, 1.0),
        memory_strength,
        energy,
    }
}

fn extract_code(text: &str) -> String {
    if let Some(code) = extract_fenced(text, "python") {
        return code;
    }
    if let Some(code) = extract_fenced(text, "") {
        return code;
    }
    // Heuristic fallback: keep lines that look like code (indentation,
    // assignment, or a keyword), dropping prose.
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.is_empty()
                || line.starts_with(' ')
                || trimmed.starts_with("def ")
                || trimmed.starts_with("import ")
                || trimmed.starts_with("print(")
                || trimmed.starts_with("return ")
                || trimmed.contains('=')
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_fenced<'a>(text: &'a str, lang: &str) -> Option<String> {
    let marker = if lang.is_empty() { "```".to_string() } else { format!("```{lang}") };
    let start = text.find(&marker)? + marker.len();
    let rest: &'a str = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

fn base_temperature(recommendation: Recommendation) -> f32 {
    match recommendation {
        Recommendation::Confident => 0.3,
        Recommendation::Cautious => 0.6,
        Recommendation::Uncertain => 0.45,
    }
}

/// Apply the fixed post-evaluation cascade from §5: HDC learn, AIF
/// update, episodic store, emotion update, promotion record, scheduler
/// record, strategy stats. Called once per tier-5..8 win and once per S2
/// attempt.
#[allow(clippy::too_many_arguments)]
fn apply_update_cascade(ctx: &mut ExecutorContext<'_>, task: &Task, concept_name: &str, hv: &Hypervector, strategy: Strategy, tier: Tier, eval: &EvalResult, attempt_index: usize, is_new_pattern: bool, was_timeout: bool, code: &str) {
    if ctx.toggles.hdc {
        if let Err(e) = ctx.concepts.learn(concept_name, hv.clone()) {
            warn!(error = %e, "concept memory learn failed");
        }
    }

    if ctx.toggles.aif {
        let observation = if eval.score >= 1.0 { 0 } else if eval.score > 0.0 { 1 } else { 2 };
        ctx.aif.step_observe(observation);
        ctx.aif.update_preferences(observation, eval.score * 2.0 - 1.0);
        ctx.aif.record_outcome(eval.score >= 1.0);
    }

    if ctx.toggles.ebbinghaus {
        let base = if eval.score >= 1.0 { 10.0 } else if eval.score > 0.0 { 3.0 } else { 0.5 };
        let durability = if is_new_pattern { 1.2 } else { 1.0 };
        let strength = EbbinghausMemory::initial_strength(base, 1.0 + task.difficulty, eval.score.max(0.05), durability);
        let mut metadata = crate::memory::RecordMetadata::new();
        metadata.insert("category".to_string(), task.category.clone());
        metadata.insert("strategy".to_string(), strategy.as_str().to_string());
        metadata.insert("code".to_string(), code.to_string());
        ctx.memory.store(hv.as_slice().to_vec(), concept_name, strength, metadata);
    }

    if ctx.toggles.emotions {
        let error_class = classify_feedback(&eval.feedback);
        ctx.emotion.process_result(SolveOutcome {
            score: eval.score,
            difficulty: task.difficulty,
            attempts_used: attempt_index as u32 + 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            is_new_pattern,
            error_class,
            was_timeout,
            previous_score: ctx.previous_score,
            streak: ctx.streak,
        });
    }

    if eval.score >= 1.0 {
        ctx.promotion.record_success(&task.category, &task.description, code, strategy, attempt_index);
    } else {
        ctx.promotion.record_failure(&task.category, &task.description, tier);
    }

    ctx.scheduler.record_outcome(&task.category, eval.score >= 1.0, ctx.now_seconds);
    ctx.strategy_stats.record_attempt(strategy);
    if eval.score >= 1.0 {
        ctx.strategy_stats.record_success(strategy);
    }
}

fn classify_feedback(feedback: &str) -> ErrorClass {
    let lower = feedback.to_lowercase();
    if lower.contains("timeout") {
        ErrorClass::Timeout
    } else if lower.contains("syntax") {
        ErrorClass::Syntax
    } else if lower.contains("index") {
        ErrorClass::Index
    } else if lower.contains("name") {
        ErrorClass::Name
    } else if lower.contains("value") {
        ErrorClass::Value
    } else if lower.contains("runtime") {
        ErrorClass::Runtime
    } else {
        ErrorClass::None
    }
}

#[allow(clippy::too_many_arguments)]
fn build_prompt(task: &Task, strategy: Strategy, attempt_index: usize, memory_hits: &[crate::memory::RecallHit], reflection_hint: Option<&str>, cautious: bool, toggles: ModuleToggles, strategy_stats: &StrategyStats) -> String {
    let mut prompt = format!("Task: {}\n\n{}\n\n", task.title, task.description);

    let case_count = if cautious { 8 } else { 5 };
    if !task.test_cases.is_empty() {
        prompt.push_str("Example test cases:\n");
        for case in task.test_cases.iter().take(case_count) {
            prompt.push_str(&format!("input: {}\nexpected: {}\n", case.input, case.expected_output));
        }
        prompt.push('\n');
    }

    if strategy == Strategy::FromMemory {
        for hit in memory_hits.iter().take(2) {
            if let Some(code) = hit.metadata.get("code") {
                prompt.push_str(&format!("A similar past solution:\n```python\n{code}\n```\n\n"));
            }
        }
    }

    if KNOWN_HARD_CATEGORIES.contains(&task.category.to_lowercase().as_str()) {
        prompt.push_str("This is a classically tricky dynamic-programming category; consider the standard recurrence before coding.\n\n");
    }

    if toggles.symbolic_regression {
        if let Some(hint) = symbolic_regression_hint(task) {
            prompt.push_str(&hint);
            prompt.push('\n');
        }
    }

    if toggles.cross_domain {
        if let Some(hint) = cross_domain_hint(strategy_stats) {
            prompt.push_str(&hint);
            prompt.push('\n');
        }
    }

    if let Some(hint) = reflection_hint {
        prompt.push_str(hint);
        prompt.push('\n');
    }

    match strategy {
        Strategy::StepByStep => prompt.push_str("Think through the algorithm step by step in comments, then write the solution.\n"),
        Strategy::WithHints => prompt.push_str("Pay close attention to input parsing and edge cases.\n"),
        _ => {}
    }

    prompt.push_str(&format!("\nThis is attempt {}. Provide a complete Python solution in a fenced python code block.", attempt_index + 1));
    prompt
}

const SYMBOLIC_REGRESSION_KEYWORDS: &[&str] = &["sequence", "formula", "closed form", "closed-form", "fit a curve", "polynomial", "interpolate"];

/// Surface a fitting-before-coding nudge when the task reads like a
/// numeric-pattern problem a symbolic regression pass would help with.
fn symbolic_regression_hint(task: &Task) -> Option<String> {
    let lower = task.description.to_lowercase();
    SYMBOLIC_REGRESSION_KEYWORDS
        .iter()
        .any(|kw| lower.contains(kw))
        .then(|| "This looks like a numeric pattern; try to spot a closed-form formula before falling back to simulation.\n".to_string())
}

/// Surface which promoted tier has been winning most often across every
/// category seen so far, as a cross-domain signal for which approach to
/// lean on.
fn cross_domain_hint(strategy_stats: &StrategyStats) -> Option<String> {
    let s0 = strategy_stats.tally(Strategy::PromotedS0);
    let s1 = strategy_stats.tally(Strategy::PromotedS1);
    let (best, tally) = if s0.success_rate() >= s1.success_rate() { (Strategy::PromotedS0, s0) } else { (Strategy::PromotedS1, s1) };
    if tally.attempts < 3 {
        return None;
    }
    Some(format!("Across other categories solved so far, cached {} solutions have won {:.0}% of the time; prefer a similarly direct approach if one applies here.\n", best.as_str(), tally.success_rate() * 100.0))
}

/// Run one solve: `task` in, `(result, metadata)` out. Never raises; the
/// best observed attempt is returned even without a pass.
pub async fn solve(ctx: &mut ExecutorContext<'_>, task: &Task, rng: &mut impl Rng) -> (SolveResult, SolveMetadata) {
    let started = Instant::now();
    let hv = ctx.encoder.encode(&task.description);
    let (concept_name, is_new, similarity) = classify_task(ctx, &hv, task);

    let memory_hits = if ctx.toggles.ebbinghaus { ctx.memory.recall(hv.as_slice(), 3).await } else { Vec::new() };

    let gut_result = if ctx.toggles.gut {
        let gut_signals = gather_gut_signals(ctx, task, similarity, is_new, &memory_hits);
        ctx.gut.aggregate(gut_signals)
    } else {
        crate::gut::GutResult {
            signals: [0.0; 6],
            valence: 0.0,
            confidence: 0.0,
            recommendation: Recommendation::Uncertain,
        }
    };

    let modifiers = if ctx.toggles.emotions { ctx.emotion.get_behavioural_modifiers() } else { EmotionState::new().get_behavioural_modifiers() };

    let mut best_attempt: Option<Attempt> = None;
    let mut winning_strategy: Option<String> = None;
    let mut attempts_used = 0u32;

    macro_rules! try_tier {
        ($code:expr, $strategy:expr, $tier:expr) => {
            if let Some(code) = $code {
                attempts_used += 1;
                let eval = ctx.evaluator.evaluate(task, &code).await;
                let exact = eval.is_exact_pass();
                apply_update_cascade(ctx, task, &concept_name, &hv, $strategy, $tier, &eval, 0, is_new, false, &code);
                best_attempt = Some(Attempt {
                    strategy: $strategy,
                    code: code.clone(),
                    score: eval.score,
                    feedback: eval.feedback.clone(),
                    elapsed: started.elapsed(),
                    reflected: false,
                });
                if exact {
                    winning_strategy = Some($strategy.as_str().to_string());
                }
            }
        };
    }

    if winning_strategy.is_none() {
        let code = ctx.deterministic.solve(task).await;
        try_tier!(code, Strategy::DeterministicS0, Tier::S0);
    }

    if winning_strategy.is_none() {
        let code = ctx.promotion.get_s0_template(&task.category, &task.description).map(str::to_string);
        try_tier!(code, Strategy::PromotedS0, Tier::S0);
    }

    if winning_strategy.is_none() && matches!(gut_result.recommendation, Recommendation::Confident) && !is_new && similarity >= S1_SIMILARITY_THRESHOLD {
        let code = memory_hits
            .iter()
            .find(|h| h.concept_name == concept_name)
            .and_then(|h| h.metadata.get("code"))
            .cloned();
        try_tier!(code, Strategy::MemoryS1, Tier::S1);
    }

    if winning_strategy.is_none() {
        let code = ctx.promotion.get_s1_solution(&task.category, &task.description).map(str::to_string);
        try_tier!(code, Strategy::PromotedS1, Tier::S1);
    }

    if winning_strategy.is_none() {
        let mut extra = modifiers.extra_attempts.min(2);
        if task.difficulty >= HARD_DIFFICULTY_THRESHOLD {
            extra += 1;
        }
        if matches!(gut_result.recommendation, Recommendation::Cautious) {
            extra += 1;
        }
        let max_loop = DEFAULT_MAX_ATTEMPTS + extra;

        let mut last_error: ErrorClass = ErrorClass::None;
        let mut last_was_direct = false;
        let mut last_was_timeout = false;

        for attempt_index in 0..max_loop as usize {
            let mut strategy = if !ctx.toggles.aif {
                Strategy::Direct
            } else if attempt_index == 0 {
                modifiers.strategy_preference.unwrap_or_else(|| S2_STRATEGIES[ctx.aif.choose_action(rng)])
            } else {
                S2_STRATEGIES[ctx.aif.choose_action(rng)]
            };

            if last_was_direct && attempt_index >= 2 {
                strategy = Strategy::WithHints;
            }
            if last_error == ErrorClass::Syntax {
                strategy = Strategy::StepByStep;
            }
            if strategy == Strategy::FromMemory && memory_hits.iter().all(|h| !h.metadata.contains_key("code")) {
                strategy = Strategy::WithHints;
            }
            strategy = ctx.strategy_stats.apply_upgrade_rule(strategy);
            last_was_direct = strategy == Strategy::Direct;

            let reflection_hint = None;
            let cautious = matches!(gut_result.recommendation, Recommendation::Cautious);
            let prompt = build_prompt(task, strategy, attempt_index, &memory_hits, reflection_hint, cautious, ctx.toggles, ctx.strategy_stats);

            let temperature = (base_temperature(gut_result.recommendation) + modifiers.temperature_delta + 0.15 * attempt_index as f32).clamp(0.1, 0.9);

            let attempt_start = Instant::now();
            let cached = if ctx.toggles.stm { ctx.prompt_cache.get(&prompt, temperature) } else { None };
            let response = if let Some(cached) = cached {
                Some(cached)
            } else {
                ctx.throttle.wait().await;
                match ctx.llm.call(&prompt, temperature).await {
                    LlmOutcome::Text(text) => {
                        ctx.throttle.record_success();
                        if ctx.toggles.stm {
                            ctx.prompt_cache.insert(&prompt, temperature, text.clone());
                        }
                        Some(text)
                    }
                    LlmOutcome::RateLimited => {
                        ctx.throttle.record_rate_limit();
                        None
                    }
                    LlmOutcome::Failed => None,
                }
            };

            attempts_used += 1;
            let Some(response) = response else {
                ctx.strategy_stats.record_attempt(strategy);
                continue;
            };

            let mut code = extract_code(&response);
            if code.trim().is_empty() {
                ctx.strategy_stats.record_attempt(strategy);
                continue;
            }

            let mut eval = ctx.evaluator.evaluate(task, &code).await;
            let mut reflected = false;

            if ctx.toggles.reflection && reflection::should_reflect(attempt_start.elapsed(), eval.score, attempt_index, eval.score < 1.0) {
                let issues = reflection::diagnose(&code, &eval);
                if !issues.is_empty() {
                    let critique = reflection::critique_prompt(&task.title, &code, &eval.feedback, &issues);
                    ctx.throttle.wait().await;
                    if let LlmOutcome::Text(text) = ctx.llm.call(&critique, 0.1).await {
                        let candidate_code = extract_code(&text);
                        if !candidate_code.trim().is_empty() {
                            let candidate_eval = ctx.evaluator.evaluate(task, &candidate_code).await;
                            if candidate_eval.score > eval.score {
                                code = candidate_code;
                                eval = candidate_eval;
                                reflected = true;
                            }
                        }
                    }
                }
            }

            last_error = classify_feedback(&eval.feedback);
            last_was_timeout = last_error == ErrorClass::Timeout;
            let exact = eval.is_exact_pass();

            apply_update_cascade(ctx, task, &concept_name, &hv, strategy, Tier::S2, &eval, attempt_index, is_new, last_was_timeout, &code);

            let is_better = best_attempt.as_ref().is_none_or(|b| eval.score > b.score);
            if is_better {
                best_attempt = Some(Attempt {
                    strategy,
                    code: code.clone(),
                    score: eval.score,
                    feedback: eval.feedback.clone(),
                    elapsed: attempt_start.elapsed(),
                    reflected,
                });
            }

            if exact {
                let suffix = if reflected { "+reflection" } else { "" };
                winning_strategy = Some(format!("{}{}", strategy.as_str(), suffix));
                break;
            }
        }
    }

    if ctx.toggles.gut {
        ctx.gut.record_outcome(&gut_result, winning_strategy.is_some());
    }

    let best = best_attempt.unwrap_or(Attempt {
        strategy: Strategy::Direct,
        code: String::new(),
        score: 0.0,
        feedback: "no attempt produced code".to_string(),
        elapsed: started.elapsed(),
        reflected: false,
    });

    let result = SolveResult {
        task_id: task.id,
        code: best.code.clone(),
        score: best.score,
        passed: winning_strategy.is_some(),
        feedback: best.feedback.clone(),
    };

    let metadata = SolveMetadata {
        winning_strategy: winning_strategy.unwrap_or_else(|| format!("{}(incomplete)", best.strategy.as_str())),
        attempts_used,
        concept_name,
        concept_is_new: is_new,
        concept_similarity: similarity,
        gut_recommendation: format!("{:?}", gut_result.recommendation).to_lowercase(),
        aif_surprise: ctx.aif.get_surprise(),
        total_elapsed: started.elapsed(),
        created_at: chrono::Utc::now(),
    };

    info!(task = %task.title, winner = %metadata.winning_strategy, attempts = attempts_used, "solve complete");
    debug!(concept = %metadata.concept_name, similarity, "perception result");

    (result, metadata)
}
