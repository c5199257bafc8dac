//! Rolling attempt/success counters per [`Strategy`], plus the edge-case
//! upgrade rule from §4.4: a strategy with enough attempts and too low a
//! success rate gets bumped to `with_hints`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Strategy;

const UPGRADE_MIN_ATTEMPTS: u32 = 50;
const UPGRADE_MAX_SUCCESS_RATE: f32 = 0.2;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Tally {
    pub attempts: u32,
    pub successes: u32,
}

impl Tally {
    #[must_use]
    pub fn success_rate(&self) -> f32 {
        if self.attempts == 0 {
            1.0
        } else {
            self.successes as f32 / self.attempts as f32
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StrategyStats {
    tallies: HashMap<Strategy, Tally>,
}

impl StrategyStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self, strategy: Strategy) {
        self.tallies.entry(strategy).or_default().attempts += 1;
    }

    /// Record the winner of a solve. Invariant: never called for a
    /// strategy that hasn't first had `record_attempt` called on it in
    /// the same solve (successes <= attempts holds by construction).
    pub fn record_success(&mut self, strategy: Strategy) {
        self.tallies.entry(strategy).or_default().successes += 1;
    }

    #[must_use]
    pub fn tally(&self, strategy: Strategy) -> Tally {
        self.tallies.get(&strategy).copied().unwrap_or_default()
    }

    /// If `strategy` is underperforming (enough attempts, too low a
    /// success rate), return the strategy it should be upgraded to;
    /// otherwise return `strategy` unchanged.
    #[must_use]
    pub fn apply_upgrade_rule(&self, strategy: Strategy) -> Strategy {
        let tally = self.tally(strategy);
        if tally.attempts >= UPGRADE_MIN_ATTEMPTS && tally.success_rate() < UPGRADE_MAX_SUCCESS_RATE && strategy != Strategy::WithHints {
            Strategy::WithHints
        } else {
            strategy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successes_never_exceed_attempts() {
        let mut stats = StrategyStats::new();
        stats.record_attempt(Strategy::Direct);
        stats.record_success(Strategy::Direct);
        let tally = stats.tally(Strategy::Direct);
        assert!(tally.successes <= tally.attempts);
    }

    #[test]
    fn underperforming_strategy_is_upgraded_to_with_hints() {
        let mut stats = StrategyStats::new();
        for _ in 0..60 {
            stats.record_attempt(Strategy::Direct);
        }
        stats.record_success(Strategy::Direct);
        assert_eq!(stats.apply_upgrade_rule(Strategy::Direct), Strategy::WithHints);
    }

    #[test]
    fn well_performing_strategy_is_not_upgraded() {
        let mut stats = StrategyStats::new();
        for _ in 0..60 {
            stats.record_attempt(Strategy::Direct);
            stats.record_success(Strategy::Direct);
        }
        assert_eq!(stats.apply_upgrade_rule(Strategy::Direct), Strategy::Direct);
    }

    #[test]
    fn fresh_strategy_has_perfect_default_success_rate() {
        let stats = StrategyStats::new();
        assert_eq!(stats.tally(Strategy::StepByStep).success_rate(), 1.0);
    }
}
