#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Cognitive core runner.
//!
//! # Usage
//!
//! ```sh
//! cascade-core run                                  # loop forever
//! cascade-core run --once                           # one solve, then exit
//! cascade-core ablation --config minimal --tasks 20  # ablated module set
//! cascade-core benchmark null 20                    # fixed collaborator set, n tasks
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use cascade_core::config::Config;
use cascade_core::core::Core;
use cascade_core::external::{NullCodeEvaluator, NullDeterministicSolver, NullLlmClient, StaticTaskSource, TaskSource};
use cascade_core::memory::InMemoryBackend;
use cascade_core::resilience::checkpoint::{CheckpointConfig, CheckpointManager};
use cascade_core::resilience::crash_log::{record_loop_state, LoopStateSnapshot};
use cascade_core::resilience::install_panic_hooks;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cognitive core runner: tiered S0/S1/S2 solve loop over a bio-inspired memory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory for checkpoint/crash-recovery state
    #[arg(long, global = true, default_value = "state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the solve loop (default: forever).
    Run {
        /// Solve a single task, then exit.
        #[arg(long)]
        once: bool,
    },
    /// Run with a named module-toggle preset against a fixed task count.
    Ablation {
        #[arg(long, default_value = "minimal")]
        config: String,
        #[arg(long, default_value_t = 20)]
        tasks: u32,
    },
    /// Run against a fixed collaborator set and task count, reporting pass rate.
    Benchmark {
        provider: String,
        tasks: u32,
    },
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).with(filter).init();

    if let Err(e) = install_panic_hooks() {
        eprintln!("failed to install panic hooks: {e}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(run(args));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Interrupted) => ExitCode::from(130),
        Err(Fatal) => ExitCode::FAILURE,
    }
}

enum RunError {
    Interrupted,
    Fatal,
}
use RunError::{Fatal, Interrupted};

async fn run(args: Args) -> Result<(), RunError> {
    let config = Config::load_or_default(&args.state_dir.join("config.json"));

    let work = async {
        match args.command.unwrap_or(Command::Run { once: false }) {
            Command::Run { once } => run_loop(config, args.state_dir, once).await,
            Command::Ablation { config: preset, tasks } => {
                let config = match preset.as_str() {
                    "minimal" => Config::minimal(),
                    "research" => Config::research(),
                    _ => {
                        warn!(preset = %preset, "unknown ablation preset, using minimal");
                        Config::minimal()
                    }
                };
                run_fixed_batch(config, tasks).await
            }
            Command::Benchmark { provider, tasks } => {
                info!(provider = %provider, "benchmark uses the null collaborator stand-ins until a real client is wired in");
                run_fixed_batch(Config::default(), tasks).await
            }
        }
    };

    tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
            Err(Interrupted)
        }
    }
}

fn new_core(config: Config) -> Core {
    Core::new(config, Box::new(InMemoryBackend::new()), Box::new(NullLlmClient), Box::new(NullCodeEvaluator), Box::new(NullDeterministicSolver))
}

/// Run a fixed number of tasks against a fresh core, for `ablation` and
/// `benchmark`. Neither checkpoints nor restarts on panic: a single
/// malformed run should just fail loudly.
async fn run_fixed_batch(config: Config, tasks: u32) -> Result<(), RunError> {
    let mut core = new_core(config);
    let mut source = StaticTaskSource::sample();

    let mut solved = 0u32;
    for i in 0..tasks {
        let Some(task) = source.next_task().await else {
            break;
        };
        let (result, metadata) = core.solve(&task).await;
        if result.passed {
            solved += 1;
        }
        info!(i, task = %task.title, passed = result.passed, strategy = %metadata.winning_strategy, "batch task complete");
    }

    info!(solved, tasks, "batch run complete");
    Ok(())
}

const FATAL_RESTART_DELAY: std::time::Duration = std::time::Duration::from_secs(10);

/// The long-running loop: solve tasks forever (or once), checkpoint
/// periodically, run sleep consolidation on the circadian clock's
/// schedule. A panic inside a solve is caught at the task boundary
/// (rather than unwinding the process) so the "Fatal in main loop"
/// policy applies: persist state, log, sleep, restart with a fresh
/// core restored from the last checkpoint.
async fn run_loop(config: Config, state_dir: PathBuf, once: bool) -> Result<(), RunError> {
    let store = cascade_core::persistence::FileStateStore::new(state_dir.clone());
    let mut source = StaticTaskSource::sample();

    'restart: loop {
        let mut core = new_core(config);
        if let Err(e) = core.restore_from(&store).await {
            warn!(error = %e, "failed to restore prior state, starting fresh");
        }

        let mut checkpoints = CheckpointManager::new(CheckpointConfig::default());
        let mut batches_completed: u64 = 0;

        if let Ok(Some(previous)) = store.load_checkpoint().await {
            info!(sequence = previous.sequence, batches_completed = previous.batches_completed, "resuming after a prior checkpoint");
        }

        loop {
            let Some(task) = source.next_task().await else {
                info!("task source exhausted");
                break 'restart;
            };

            record_loop_state(LoopStateSnapshot {
                batches_completed,
                circadian_phase: Some(format!("{:?}", core.circadian_state().phase)),
                current_category: Some(task.category.clone()),
                current_task: Some(task.title.clone()),
            });

            // Run the solve on its own task so a panic unwinds there
            // rather than taking the whole process down; `core` moves
            // in and is handed back out on success.
            let join = tokio::spawn(async move {
                let (result, metadata) = core.solve(&task).await;
                (core, result, metadata)
            });

            let (result, metadata) = match join.await {
                Ok((returned_core, result, metadata)) => {
                    core = returned_core;
                    (result, metadata)
                }
                Err(join_error) => {
                    error!(error = %join_error, "fatal error in main loop, persisting state and restarting");
                    // `core` was moved into the panicked task and is gone;
                    // the last periodic checkpoint is what a restart
                    // restores from.
                    tokio::time::sleep(FATAL_RESTART_DELAY).await;
                    continue 'restart;
                }
            };

            info!(
                task = %task.title,
                passed = result.passed,
                score = result.score,
                strategy = %metadata.winning_strategy,
                attempts = metadata.attempts_used,
                "solved"
            );

            batches_completed += 1;

            if core.circadian_state().is_sleep_time() {
                if let Err(e) = core.run_sleep_cycle(0.1, 0.3).await {
                    error!(error = %e, "sleep cycle failed");
                }
            }

            if checkpoints.should_checkpoint(batches_completed) {
                let state = core.circadian_state();
                let checkpoint = checkpoints.create_checkpoint(batches_completed, format!("{:?}", state.phase), state.fatigue);
                info!(sequence = checkpoint.sequence, "checkpoint");
                if let Err(e) = store.save_checkpoint(&checkpoint).await {
                    error!(error = %e, "checkpoint failed, continuing");
                }
                if let Err(e) = core.checkpoint_to(&store).await {
                    error!(error = %e, "checkpoint failed, continuing");
                }
            }

            if once {
                if let Err(e) = core.checkpoint_to(&store).await {
                    error!(error = %e, "final checkpoint failed");
                }
                break 'restart;
            }
        }
    }

    Ok(())
}
