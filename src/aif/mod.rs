//! Active inference agent: variational belief update and expected
//! free-energy action selection.
//!
//! Grounded on `drives::free_energy::FreeEnergyModule` (pragmatic +
//! epistemic value, precision-weighted softmax) and
//! `drives::curiosity::CuriosityModule` (prediction-error-as-surprise),
//! generalised from "thought vectors vs law crystals" to a discrete POMDP
//! over executor strategies, per the spec's §4.2.

pub mod types;

use rand::Rng;
use tracing::warn;

pub use types::BeliefState;

/// Minimum probability floor used in surprise's `max(eps, ...)` term and
/// anywhere a log of a probability is taken.
const EPS: f32 = 1e-6;

/// Preference-update learning rate (eta).
const PREFERENCE_LR: f32 = 0.05;

const EXPLORATION_MIN: f32 = 0.15;
const EXPLORATION_MAX: f32 = 0.8;
const EXPLORATION_SUCCESS_DECAY: f32 = 0.993;
const EXPLORATION_FAILURE_GROWTH: f32 = 1.008;

/// Active inference agent over a fixed set of discrete observations and
/// actions, each action associated with one "tends-to-lead-to" preferred
/// observation.
#[derive(Debug, Clone)]
pub struct AifAgent {
    belief: BeliefState,
    /// `action_obs_map[a]` = observation index that action `a` tends to
    /// produce, the agent's minimal generative model.
    action_obs_map: Vec<usize>,
    last_surprise: f32,
}

impl AifAgent {
    #[must_use]
    pub fn new(num_states: usize, num_observations: usize, action_obs_map: Vec<usize>) -> Self {
        Self {
            belief: BeliefState::uniform(num_states, num_observations),
            action_obs_map,
            last_surprise: 0.0,
        }
    }

    #[must_use]
    pub fn belief(&self) -> &BeliefState {
        &self.belief
    }

    /// Update the belief from a new observation `o` and return nothing:
    /// callers read [`Self::get_surprise`] afterwards. Reinitialises to a
    /// uniform prior if the update would produce NaNs.
    pub fn step_observe(&mut self, o: usize) {
        let num_states = self.belief.num_states();
        if o >= self.belief.num_observations() {
            warn!(o, "observation index out of range, ignoring");
            return;
        }

        let likelihood_row = self.belief.likelihood[o].clone();
        let mut posterior: Vec<f32> = likelihood_row
            .iter()
            .zip(self.belief.state_prior.iter())
            .map(|(l, p)| l * p)
            .collect();
        let norm: f32 = posterior.iter().sum();
        if norm > EPS {
            for p in &mut posterior {
                *p /= norm;
            }
        } else {
            posterior = vec![1.0 / num_states as f32; num_states];
        }

        let evidence: f32 = posterior.iter().zip(likelihood_row.iter()).map(|(p, l)| p * l).sum();
        self.last_surprise = -(evidence.max(EPS)).ln();

        for (prior, post) in self.belief.state_prior.iter_mut().zip(posterior.iter()) {
            *prior = 0.9 * *prior + 0.1 * post;
        }

        if self.belief.has_nan() || self.last_surprise.is_nan() {
            warn!("belief state produced NaN, reinitialising to uniform prior");
            let (num_states, num_observations) = (self.belief.num_states(), self.belief.num_observations());
            self.belief = BeliefState::uniform(num_states, num_observations);
            self.last_surprise = 0.0;
        }
    }

    /// Shannon surprise of the most recent observation under the prior.
    /// Always `>= 0`.
    #[must_use]
    pub fn get_surprise(&self) -> f32 {
        self.last_surprise.max(0.0)
    }

    /// Choose an action index in `[0, num_actions)` via expected
    /// free-energy minimisation, mixed with uniform exploration weighted
    /// by `exploration_weight`.
    pub fn choose_action(&self, rng: &mut impl Rng) -> usize {
        let num_actions = self.action_obs_map.len();
        if num_actions == 0 {
            return 0;
        }

        let efe: Vec<f32> = self
            .action_obs_map
            .iter()
            .map(|&o| self.expected_free_energy(o))
            .collect();

        // Softmax over -EFE at temperature 1.
        let max_neg_efe = efe.iter().map(|e| -e).fold(f32::NEG_INFINITY, f32::max);
        let weights: Vec<f32> = efe.iter().map(|e| (-e - max_neg_efe).exp()).collect();
        let sum: f32 = weights.iter().sum();
        let softmax: Vec<f32> = if sum > EPS {
            weights.iter().map(|w| w / sum).collect()
        } else {
            vec![1.0 / num_actions as f32; num_actions]
        };

        let uniform = 1.0 / num_actions as f32;
        let mixed: Vec<f32> = softmax
            .iter()
            .map(|p| (1.0 - self.belief.exploration_weight) * p + self.belief.exploration_weight * uniform)
            .collect();

        sample_categorical(&mixed, rng)
    }

    /// `EFE(a) = -E[log preference(o|a)] - weighted epistemic gain`, where
    /// the epistemic term is approximated by the current surprise (an
    /// action that tends toward a poorly-predicted observation has more to
    /// learn from visiting it).
    fn expected_free_energy(&self, predicted_obs: usize) -> f32 {
        let pragmatic = self.belief.preference.get(predicted_obs).copied().unwrap_or(0.0);
        let epistemic_gain = self.get_surprise();
        -pragmatic - 0.1 * epistemic_gain
    }

    /// `preference[o] <- clamp(preference[o] + eta*reward, -5, 5)`.
    pub fn update_preferences(&mut self, observation: usize, reward: f32) {
        if let Some(p) = self.belief.preference.get_mut(observation) {
            *p = (*p + PREFERENCE_LR * reward).clamp(-5.0, 5.0);
        }
    }

    /// Exploration dynamics: decays toward exploitation on solved
    /// observations, grows toward exploration on failures, both clamped to
    /// `[0.15, 0.8]`.
    pub fn record_outcome(&mut self, solved: bool) {
        self.belief.exploration_weight = if solved {
            (self.belief.exploration_weight * EXPLORATION_SUCCESS_DECAY).max(EXPLORATION_MIN)
        } else {
            (self.belief.exploration_weight * EXPLORATION_FAILURE_GROWTH).min(EXPLORATION_MAX)
        };
    }
}

fn sample_categorical(weights: &[f32], rng: &mut impl Rng) -> usize {
    let total: f32 = weights.iter().sum();
    if total <= EPS {
        return 0;
    }
    let mut roll = rng.random_range(0.0f32..total);
    for (idx, w) in weights.iter().enumerate() {
        if roll < *w {
            return idx;
        }
        roll -= w;
    }
    weights.len() - 1
}
