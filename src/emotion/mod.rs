//! Six-channel Ekman-inspired emotion state.
//!
//! Grounded on `core::types::SalienceScore`'s valence/arousal pair
//! (Russell's circumplex model, already present in the teacher), expanded
//! from two affective dimensions to the spec's six discrete channels, each
//! with its own decay rate and saturating update rule.

use serde::{Deserialize, Serialize};

/// One of the six Ekman basic emotions tracked by [`EmotionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Joy,
    Sadness,
    Anger,
    Fear,
    Disgust,
    Surprise,
}

const CHANNELS: [Channel; 6] = [
    Channel::Joy,
    Channel::Sadness,
    Channel::Anger,
    Channel::Fear,
    Channel::Disgust,
    Channel::Surprise,
];

/// Per-channel decay rate (fraction removed per solve).
fn decay_rate(channel: Channel) -> f32 {
    match channel {
        Channel::Joy => 0.08,
        Channel::Sadness => 0.05,
        Channel::Anger => 0.12,
        Channel::Fear => 0.10,
        Channel::Disgust => 0.15,
        Channel::Surprise => 0.25,
    }
}

fn channel_index(channel: Channel) -> usize {
    CHANNELS.iter().position(|c| *c == channel).expect("channel is in CHANNELS")
}

/// Failure classification surfaced by the evaluator's feedback string
/// (§6: feedback must include one of a fixed set of tokens).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    None,
    Syntax,
    Timeout,
    Runtime,
    Index,
    Name,
    Value,
}

/// Inputs to one emotion update, assembled by the executor after an
/// evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SolveOutcome {
    pub score: f32,
    pub difficulty: f32,
    pub attempts_used: u32,
    pub max_attempts: u32,
    pub is_new_pattern: bool,
    pub error_class: ErrorClass,
    pub was_timeout: bool,
    pub previous_score: f32,
    pub streak: i32,
}

/// Behavioural modifiers derived from the current emotional state, read by
/// the executor before each solve.
#[derive(Debug, Clone, Copy)]
pub struct BehaviouralModifiers {
    pub temperature_delta: f32,
    pub extra_attempts: u32,
    pub strategy_preference: Option<crate::core::types::Strategy>,
    pub prompt_tone: PromptTone,
    pub dominant: Channel,
    pub valence: f32,
    pub arousal: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTone {
    Neutral,
    Encouraging,
    Cautious,
    Focused,
}

/// Process-wide emotional state singleton, owned by `Core` and passed by
/// mutable reference rather than accessed globally (per §9's "Global
/// mutable state" redesign note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionState {
    intensities: [f32; 6],
}

impl Default for EmotionState {
    fn default() -> Self {
        Self { intensities: [0.0; 6] }
    }
}

impl EmotionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn intensity(&self, channel: Channel) -> f32 {
        self.intensities[channel_index(channel)]
    }

    fn bump(&mut self, channel: Channel, delta: f32) {
        let idx = channel_index(channel);
        let current = self.intensities[idx];
        // Sigmoid-shaped saturation: diminishing returns as the channel
        // approaches 1.0, so no single update can jump it past the ceiling.
        let headroom = 1.0 - current;
        self.intensities[idx] = (current + delta * headroom).clamp(0.0, 1.0);
    }

    /// Decay every channel by its own rate, then apply trigger rules for
    /// `outcome`. This is the only entry point that mutates the state;
    /// call once per solve.
    pub fn process_result(&mut self, outcome: SolveOutcome) {
        for channel in CHANNELS {
            let idx = channel_index(channel);
            self.intensities[idx] *= 1.0 - decay_rate(channel);
        }

        let near_miss = outcome.score > 0.0 && outcome.score < 1.0 && outcome.attempts_used >= outcome.max_attempts;
        let score_delta = (outcome.score - outcome.previous_score).abs();

        if outcome.score >= 1.0 {
            self.bump(Channel::Joy, 0.3 + 0.05 * outcome.streak.max(0) as f32);
            self.bump(Channel::Sadness, -0.1);
        } else if outcome.score <= 0.0 {
            self.bump(Channel::Sadness, 0.2);
        }

        if near_miss || outcome.was_timeout {
            self.bump(Channel::Anger, 0.25);
        }
        if matches!(outcome.error_class, ErrorClass::Syntax | ErrorClass::Name | ErrorClass::Value) {
            self.bump(Channel::Disgust, 0.2);
        }
        if outcome.is_new_pattern || outcome.difficulty > 0.7 {
            self.bump(Channel::Fear, 0.15);
        }
        if score_delta >= 0.5 {
            self.bump(Channel::Surprise, 0.3);
        }
    }

    /// Valence in `[-1, 1]`: positive channels minus negative channels,
    /// normalised by their sum.
    #[must_use]
    pub fn valence(&self) -> f32 {
        let positive = self.intensity(Channel::Joy) + self.intensity(Channel::Surprise) * 0.3;
        let negative = self.intensity(Channel::Sadness) + self.intensity(Channel::Anger) + self.intensity(Channel::Fear) + self.intensity(Channel::Disgust);
        let total = positive + negative;
        if total < f32::EPSILON {
            0.0
        } else {
            ((positive - negative) / total).clamp(-1.0, 1.0)
        }
    }

    /// Arousal in `[0, 1]`: mean intensity across all channels, scaled up
    /// (high-arousal channels dominate the overall activation level).
    #[must_use]
    pub fn arousal(&self) -> f32 {
        let mean = self.intensities.iter().sum::<f32>() / self.intensities.len() as f32;
        (mean * 1.5).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn dominant(&self) -> Channel {
        CHANNELS
            .iter()
            .copied()
            .max_by(|a, b| self.intensity(*a).partial_cmp(&self.intensity(*b)).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(Channel::Joy)
    }

    /// Derive the behavioural modifiers the executor reads before a solve.
    #[must_use]
    pub fn get_behavioural_modifiers(&self) -> BehaviouralModifiers {
        let anger = self.intensity(Channel::Anger);
        let fear = self.intensity(Channel::Fear);
        let joy = self.intensity(Channel::Joy);
        let sadness = self.intensity(Channel::Sadness);
        let surprise = self.intensity(Channel::Surprise);

        let temperature_delta = 0.15 * sadness + 0.1 * surprise - 0.1 * joy;
        let extra_attempts = if anger > 0.4 { 2 } else if anger > 0.2 { 1 } else { 0 };

        let strategy_preference = if fear > 0.5 {
            Some(crate::core::types::Strategy::WithHints)
        } else if anger > 0.5 {
            Some(crate::core::types::Strategy::Direct)
        } else {
            None
        };

        let prompt_tone = if fear > 0.4 {
            PromptTone::Cautious
        } else if joy > 0.4 {
            PromptTone::Encouraging
        } else if anger > 0.4 {
            PromptTone::Focused
        } else {
            PromptTone::Neutral
        };

        BehaviouralModifiers {
            temperature_delta,
            extra_attempts,
            strategy_preference,
            prompt_tone,
            dominant: self.dominant(),
            valence: self.valence(),
            arousal: self.arousal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(score: f32) -> SolveOutcome {
        SolveOutcome {
            score,
            difficulty: 0.3,
            attempts_used: 1,
            max_attempts: 3,
            is_new_pattern: false,
            error_class: ErrorClass::None,
            was_timeout: false,
            previous_score: 0.0,
            streak: 0,
        }
    }

    #[test]
    fn success_increases_joy_and_decreases_sadness() {
        let mut state = EmotionState::new();
        state.process_result(outcome(0.0));
        let sadness_after_failure = state.intensity(Channel::Sadness);
        state.process_result(outcome(1.0));
        assert!(state.intensity(Channel::Joy) > 0.0);
        assert!(state.intensity(Channel::Sadness) <= sadness_after_failure);
    }

    #[test]
    fn timeout_increases_anger() {
        let mut state = EmotionState::new();
        let mut o = outcome(0.0);
        o.was_timeout = true;
        state.process_result(o);
        assert!(state.intensity(Channel::Anger) > 0.0);
    }

    #[test]
    fn channels_stay_within_unit_interval() {
        let mut state = EmotionState::new();
        for _ in 0..100 {
            let mut o = outcome(1.0);
            o.streak = 50;
            state.process_result(o);
        }
        for c in CHANNELS {
            let v = state.intensity(c);
            assert!((0.0..=1.0).contains(&v), "{c:?} = {v}");
        }
    }

    #[test]
    fn valence_and_arousal_are_bounded() {
        let mut state = EmotionState::new();
        state.process_result(outcome(0.0));
        assert!((-1.0..=1.0).contains(&state.valence()));
        assert!((0.0..=1.0).contains(&state.arousal()));
    }

    #[test]
    fn anger_raises_extra_attempts() {
        let mut state = EmotionState::new();
        let mut o = outcome(0.0);
        o.was_timeout = true;
        for _ in 0..5 {
            state.process_result(o);
        }
        let modifiers = state.get_behavioural_modifiers();
        assert!(modifiers.extra_attempts > 0);
    }
}
