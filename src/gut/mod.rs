//! Gut-feeling aggregator: a self-calibrating weighted synthesis of several
//! cheap signals into one recommendation, read by the executor before
//! committing to the generative tier.
//!
//! Grounded on the teacher's `drives` weighting pattern (several scalar
//! drives combined into one action bias) generalised per §4.7 to six named
//! signals with rolling-accuracy-driven weight recalibration.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Rolling window length for weight recalibration.
const CALIBRATION_WINDOW: usize = 20;
const LOW_ACCURACY: f32 = 0.6;
const HIGH_ACCURACY: f32 = 0.8;
const WEIGHT_STEP: f32 = 0.03;
const MIN_WEIGHT: f32 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Familiarity,
    TrackRecord,
    Momentum,
    Complexity,
    MemoryStrength,
    Energy,
}

const SIGNALS: [Signal; 6] = [
    Signal::Familiarity,
    Signal::TrackRecord,
    Signal::Momentum,
    Signal::Complexity,
    Signal::MemoryStrength,
    Signal::Energy,
];

fn signal_index(signal: Signal) -> usize {
    SIGNALS.iter().position(|s| *s == signal).expect("signal is in SIGNALS")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Confident,
    Cautious,
    Uncertain,
}

/// Values feeding one aggregation call, each pre-clipped to `[-1, 1]` by
/// the caller.
#[derive(Debug, Clone, Copy)]
pub struct SignalInputs {
    pub familiarity: f32,
    pub track_record: f32,
    pub momentum: f32,
    pub complexity: f32,
    pub memory_strength: f32,
    pub energy: f32,
}

impl SignalInputs {
    fn as_array(&self) -> [f32; 6] {
        [
            self.familiarity.clamp(-1.0, 1.0),
            self.track_record.clamp(-1.0, 1.0),
            self.momentum.clamp(-1.0, 1.0),
            self.complexity.clamp(-1.0, 1.0),
            self.memory_strength.clamp(-1.0, 1.0),
            self.energy.clamp(-1.0, 1.0),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GutResult {
    pub signals: [f32; 6],
    pub valence: f32,
    pub confidence: f32,
    pub recommendation: Recommendation,
}

/// A past aggregation paired with whether the recommendation turned out
/// right, used to recalibrate signal weights.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    valence: f32,
    correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GutAggregator {
    weights: [f32; 6],
    #[serde(skip)]
    history: VecDeque<Outcome>,
}

impl Default for GutAggregator {
    fn default() -> Self {
        Self {
            weights: [1.0 / 6.0; 6],
            history: VecDeque::with_capacity(CALIBRATION_WINDOW),
        }
    }
}

impl GutAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn weight(&self, signal: Signal) -> f32 {
        self.weights[signal_index(signal)]
    }

    /// Combine `inputs` into a [`GutResult`] using the current weights.
    #[must_use]
    pub fn aggregate(&self, inputs: SignalInputs) -> GutResult {
        let values = inputs.as_array();
        let weight_sum: f32 = self.weights.iter().sum();
        let valence = if weight_sum > f32::EPSILON {
            values.iter().zip(self.weights.iter()).map(|(v, w)| v * w).sum::<f32>() / weight_sum
        } else {
            0.0
        };

        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        let confidence = (1.0 - variance.sqrt()).clamp(0.0, 1.0);

        let recommendation = if valence > 0.25 && confidence > 0.4 {
            Recommendation::Confident
        } else if valence < -0.25 && confidence > 0.4 {
            Recommendation::Cautious
        } else {
            Recommendation::Uncertain
        };

        GutResult {
            signals: values,
            valence,
            confidence,
            recommendation,
        }
    }

    /// Record whether a past [`GutResult`]'s binary prediction (confident
    /// implies "will succeed") matched the observed solve outcome, and
    /// recalibrate weights once the rolling window fills.
    pub fn record_outcome(&mut self, result: &GutResult, solved: bool) {
        let predicted_success = matches!(result.recommendation, Recommendation::Confident);
        let predicted_failure = matches!(result.recommendation, Recommendation::Cautious);
        let correct = if predicted_success {
            solved
        } else if predicted_failure {
            !solved
        } else {
            true
        };

        if self.history.len() == CALIBRATION_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(Outcome {
            valence: result.valence,
            correct,
        });

        if self.history.len() < CALIBRATION_WINDOW {
            return;
        }

        let accuracy = self.history.iter().filter(|o| o.correct).count() as f32 / self.history.len() as f32;
        let energy_idx = signal_index(Signal::Energy);
        let track_idx = signal_index(Signal::TrackRecord);

        if accuracy < LOW_ACCURACY {
            self.weights[energy_idx] += WEIGHT_STEP;
            self.weights[track_idx] = (self.weights[track_idx] - WEIGHT_STEP).max(MIN_WEIGHT);
        } else if accuracy > HIGH_ACCURACY {
            self.weights[track_idx] += WEIGHT_STEP;
            self.weights[energy_idx] = (self.weights[energy_idx] - WEIGHT_STEP).max(MIN_WEIGHT);
        }

        let total: f32 = self.weights.iter().sum();
        if total > f32::EPSILON {
            for w in &mut self.weights {
                *w /= total;
            }
        }
    }
}
