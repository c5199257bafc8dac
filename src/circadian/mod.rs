//! Circadian clock: a pure function of batch position within the day,
//! plus the behavioural modifiers it exposes to the executor.
//!
//! Grounded on `core::types::Window`'s phase/lifecycle bookkeeping style,
//! generalised from a single open/closed window to a cyclic day-phase
//! model per §4.6.

pub mod sleep_actor;

use serde::{Deserialize, Serialize};

/// Reference batches-per-day used when the caller doesn't override it.
pub const DEFAULT_BATCHES_PER_DAY: u32 = 48;
const FATIGUE_PER_BATCH: f32 = 0.02;
const FATIGUE_RESET: f32 = 0.1;

/// One of eight equal-width slices of the day. `phase_for` partitions
/// `[0, 1)` into eighths in this same order, so each variant's boundary
/// is exact rather than approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Dawn,
    MorningPeak,
    Midday,
    AfternoonDip,
    SecondWind,
    Evening,
    WindDown,
    Sleep,
}

/// Derived, read-only view of the clock's state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircadianState {
    pub batch_in_day: u32,
    pub day_number: u32,
    pub fatigue: f32,
    pub phase: Phase,
    pub difficulty_preference: i32,
    pub exploration_modifier: f32,
    pub temperature_modifier: f32,
}

impl CircadianState {
    #[must_use]
    pub fn is_sleep_time(&self) -> bool {
        self.phase == Phase::Sleep
    }
}

/// `phase` is a pure function of `batch_in_day / batches_per_day`: the
/// day is split into eight equal eighths, dawn through sleep, each
/// boundary an exact multiple of 0.125 so the eight ranges partition
/// `[0, 1)` with no gap or overlap.
fn phase_for(batch_in_day: u32, batches_per_day: u32) -> Phase {
    let fraction = batch_in_day as f32 / batches_per_day.max(1) as f32;
    if fraction < 0.125 {
        Phase::Dawn
    } else if fraction < 0.25 {
        Phase::MorningPeak
    } else if fraction < 0.375 {
        Phase::Midday
    } else if fraction < 0.5 {
        Phase::AfternoonDip
    } else if fraction < 0.625 {
        Phase::SecondWind
    } else if fraction < 0.75 {
        Phase::Evening
    } else if fraction < 0.875 {
        Phase::WindDown
    } else {
        Phase::Sleep
    }
}

fn modifiers_for(phase: Phase) -> (i32, f32, f32) {
    match phase {
        Phase::Dawn => (0, 0.05, 0.05),
        Phase::MorningPeak => (2, -0.15, -0.1),
        Phase::Midday => (1, -0.05, -0.05),
        Phase::AfternoonDip => (-1, 0.1, 0.1),
        Phase::SecondWind => (1, -0.05, 0.0),
        Phase::Evening => (0, 0.05, 0.05),
        Phase::WindDown => (-2, 0.1, 0.1),
        Phase::Sleep => (-3, 0.15, 0.1),
    }
}

/// Per-batch telemetry fed into [`CircadianClock::advance_batch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchEvent {
    pub solved: bool,
    pub time_ms: f64,
}

/// Tracks day-relative batch position and accumulated fatigue, grounded
/// on the spec's `{batch_in_day, day_number, fatigue, subjective_time,
/// total_batches, phase_stats}` persistence shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircadianClock {
    batch_in_day: u32,
    day_number: u32,
    fatigue: f32,
    subjective_time: f64,
    total_batches: u64,
    batches_per_day: u32,
    phase_stats: std::collections::HashMap<String, u64>,
}

impl Default for CircadianClock {
    fn default() -> Self {
        Self {
            batch_in_day: 0,
            day_number: 0,
            fatigue: FATIGUE_RESET,
            subjective_time: 0.0,
            total_batches: 0,
            batches_per_day: DEFAULT_BATCHES_PER_DAY,
            phase_stats: std::collections::HashMap::new(),
        }
    }
}

impl CircadianClock {
    #[must_use]
    pub fn new(batches_per_day: u32) -> Self {
        Self {
            batches_per_day: batches_per_day.max(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get_state(&self) -> CircadianState {
        let phase = phase_for(self.batch_in_day, self.batches_per_day);
        let (difficulty_preference, exploration_modifier, temperature_modifier) = modifiers_for(phase);
        CircadianState {
            batch_in_day: self.batch_in_day,
            day_number: self.day_number,
            fatigue: self.fatigue,
            phase,
            difficulty_preference,
            exploration_modifier,
            temperature_modifier,
        }
    }

    #[must_use]
    pub fn is_sleep_time(&self) -> bool {
        self.get_state().is_sleep_time()
    }

    /// Advance by one batch, returning the resulting state.
    pub fn advance_batch(&mut self, event: BatchEvent) -> CircadianState {
        self.total_batches += 1;
        self.subjective_time += event.time_ms;
        self.fatigue = (self.fatigue + FATIGUE_PER_BATCH).min(1.0);

        let phase = phase_for(self.batch_in_day, self.batches_per_day);
        *self.phase_stats.entry(format!("{phase:?}")).or_insert(0) += 1;
        if event.solved {
            *self.phase_stats.entry(format!("{phase:?}_solved")).or_insert(0) += 1;
        }

        self.batch_in_day += 1;
        if self.batch_in_day >= self.batches_per_day {
            self.batch_in_day = 0;
            self.day_number += 1;
            self.fatigue = FATIGUE_RESET;
        }

        self.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_is_constant_within_each_batch_in_day() {
        let mut clock = CircadianClock::new(48);
        for _ in 0..47 {
            clock.advance_batch(BatchEvent { solved: true, time_ms: 100.0 });
        }
        let a = phase_for(clock.batch_in_day, clock.batches_per_day);
        let b = phase_for(clock.batch_in_day, clock.batches_per_day);
        assert_eq!(a, b);
    }

    #[test]
    fn fatigue_resets_on_day_rollover() {
        let mut clock = CircadianClock::new(4);
        for _ in 0..4 {
            clock.advance_batch(BatchEvent { solved: false, time_ms: 10.0 });
        }
        assert_eq!(clock.day_number, 1);
        assert_eq!(clock.fatigue, FATIGUE_RESET);
    }

    #[test]
    fn sleep_time_is_true_only_in_sleep_phase() {
        let mut clock = CircadianClock::new(20);
        let mut saw_sleep = false;
        for _ in 0..20 {
            let state = clock.advance_batch(BatchEvent { solved: true, time_ms: 1.0 });
            if state.is_sleep_time() {
                saw_sleep = true;
                assert_eq!(state.phase, Phase::Sleep);
            }
        }
        assert!(saw_sleep);
    }

    #[test]
    fn fatigue_increases_monotonically_within_a_day() {
        let mut clock = CircadianClock::new(48);
        let mut prev = clock.fatigue;
        for _ in 0..10 {
            let state = clock.advance_batch(BatchEvent { solved: true, time_ms: 1.0 });
            assert!(state.fatigue >= prev);
            prev = state.fatigue;
        }
    }
}
