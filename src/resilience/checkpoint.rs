//! Periodic checkpoint bookkeeping: how often to snapshot the loop, and a
//! small, bounded-size record of where it was. The actual file write goes
//! through [`crate::persistence::StateStore`]; this module only decides
//! *when* and builds the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for checkpointing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// How often to checkpoint, in batches solved.
    pub interval: u64,
    /// Maximum number of checkpoint files to retain.
    pub max_checkpoints: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 100,
            max_checkpoints: 10,
        }
    }
}

/// A snapshot of loop-level progress, cheap enough to take every
/// `interval` batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
    pub batches_completed: u64,
    pub circadian_phase: String,
    pub fatigue: f32,
    pub sequence: u64,
}

impl Checkpoint {
    #[must_use]
    pub fn new(batches_completed: u64, circadian_phase: impl Into<String>, fatigue: f32, sequence: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            batches_completed,
            circadian_phase: circadian_phase.into(),
            fatigue,
            sequence,
        }
    }
}

/// Decides when to checkpoint and stamps each one with a sequence number.
pub struct CheckpointManager {
    config: CheckpointConfig,
    current_sequence: u64,
}

impl CheckpointManager {
    #[must_use]
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            config,
            current_sequence: 0,
        }
    }

    #[must_use]
    pub fn should_checkpoint(&self, batches_completed: u64) -> bool {
        batches_completed > 0 && batches_completed % self.config.interval == 0
    }

    pub fn create_checkpoint(&mut self, batches_completed: u64, circadian_phase: impl Into<String>, fatigue: f32) -> Checkpoint {
        self.current_sequence += 1;
        Checkpoint::new(batches_completed, circadian_phase, fatigue, self.current_sequence)
    }

    #[must_use]
    pub fn max_checkpoints(&self) -> usize {
        self.config.max_checkpoints
    }
}
