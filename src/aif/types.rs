//! Belief-state types for the active inference agent.

use serde::{Deserialize, Serialize};

/// Discrete POMDP belief state: a prior over hidden states, an
/// observation-likelihood matrix, and per-observation preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefState {
    /// `state_prior[s]`, length `num_states`, sums to 1.
    pub state_prior: Vec<f32>,
    /// `likelihood[o][s] = P(o | s)`, each row sums to 1.
    pub likelihood: Vec<Vec<f32>>,
    /// `preference[o]`, clamped to `[-5, 5]`.
    pub preference: Vec<f32>,
    pub exploration_weight: f32,
}

impl BeliefState {
    /// Uniform prior, identity-ish likelihood (each observation most
    /// likely under its same-indexed state), zero preferences.
    #[must_use]
    pub fn uniform(num_states: usize, num_observations: usize) -> Self {
        let state_prior = vec![1.0 / num_states as f32; num_states];
        let mut likelihood = vec![vec![1.0 / num_states as f32; num_states]; num_observations];
        for (o, row) in likelihood.iter_mut().enumerate() {
            if o < num_states {
                let boost = 0.5;
                let remainder = (1.0 - boost) / (num_states - 1).max(1) as f32;
                for (s, cell) in row.iter_mut().enumerate() {
                    *cell = if s == o { boost } else { remainder };
                }
            }
        }
        Self {
            state_prior,
            likelihood,
            preference: vec![0.0; num_observations],
            exploration_weight: 0.3,
        }
    }

    #[must_use]
    pub fn num_states(&self) -> usize {
        self.state_prior.len()
    }

    #[must_use]
    pub fn num_observations(&self) -> usize {
        self.likelihood.len()
    }

    /// True if any prior or likelihood entry is NaN.
    #[must_use]
    pub fn has_nan(&self) -> bool {
        self.state_prior.iter().any(|v| v.is_nan())
            || self.likelihood.iter().flatten().any(|v| v.is_nan())
            || self.preference.iter().any(|v| v.is_nan())
    }
}
