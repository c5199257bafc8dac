//! Promotion pipeline: tracks repeated wins per task fingerprint and
//! promotes solutions from generative (S2) to cached-procedural (S1) to
//! deterministic-template (S0) tiers.
//!
//! Grounded on the teacher's concept-memory LRU idiom (bounded recent-
//! members buffer, see `hdc::concept_memory::Concept`) reapplied here to
//! winning-snippet storage per fingerprint.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::types::{Strategy, Tier};

/// Bounded number of winning snippets retained per fingerprint.
const SNIPPET_CAP: usize = 8;

/// S2→S1 requires at least this many distinct wins...
const PROMOTE_S1_MIN_WINS: u32 = 3;
/// ...across at least this many distinct strategies.
const PROMOTE_S1_MIN_STRATEGIES: usize = 2;
/// S1→S0 requires this many additional wins beyond the S1 threshold.
const PROMOTE_S0_EXTRA_WINS: u32 = 5;
/// ...with at least one first-try success in the last K attempts.
const FIRST_TRY_WINDOW: usize = 10;
/// Consecutive failures at a promoted tier before it is demoted.
const DEMOTE_AFTER_FAILURES: u32 = 3;

fn normalise(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn fingerprint(category: &str, description: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    category.hash(&mut hasher);
    normalise(description).hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WinningSnippet {
    code: String,
    strategy: Strategy,
    reference_count: u32,
}

/// Per-fingerprint record: accumulated wins, the tier it currently sits
/// at, and enough recent-attempt history to evaluate the promotion and
/// demotion rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FingerprintRecord {
    tier: Tier,
    snippets: VecDeque<WinningSnippet>,
    strategies_won: HashSet<Strategy>,
    total_wins: u32,
    /// `true` entries mark a first-try win (attempt index 0) within the
    /// trailing [`FIRST_TRY_WINDOW`].
    recent_attempts: VecDeque<bool>,
    consecutive_failures: u32,
}

impl FingerprintRecord {
    fn new() -> Self {
        Self {
            tier: Tier::S2,
            snippets: VecDeque::with_capacity(SNIPPET_CAP),
            strategies_won: HashSet::new(),
            total_wins: 0,
            recent_attempts: VecDeque::with_capacity(FIRST_TRY_WINDOW),
            consecutive_failures: 0,
        }
    }

    fn push_snippet(&mut self, code: String, strategy: Strategy) {
        if let Some(existing) = self.snippets.iter_mut().find(|s| s.code == code) {
            existing.reference_count += 1;
            return;
        }
        if self.snippets.len() == SNIPPET_CAP {
            self.snippets.pop_front();
        }
        self.snippets.push_back(WinningSnippet {
            code,
            strategy,
            reference_count: 1,
        });
    }

    fn record_first_try_flag(&mut self, first_try: bool) {
        if self.recent_attempts.len() == FIRST_TRY_WINDOW {
            self.recent_attempts.pop_front();
        }
        self.recent_attempts.push_back(first_try);
    }

    fn has_first_try_success(&self) -> bool {
        self.recent_attempts.iter().any(|v| *v)
    }

    fn maybe_promote(&mut self) {
        match self.tier {
            Tier::S2 if self.total_wins >= PROMOTE_S1_MIN_WINS && self.strategies_won.len() >= PROMOTE_S1_MIN_STRATEGIES => {
                self.tier = Tier::S1;
            }
            Tier::S1 if self.total_wins >= PROMOTE_S1_MIN_WINS + PROMOTE_S0_EXTRA_WINS && self.has_first_try_success() => {
                self.tier = Tier::S0;
            }
            _ => {}
        }
    }

    fn maybe_demote(&mut self) {
        if self.consecutive_failures >= DEMOTE_AFTER_FAILURES {
            self.tier = match self.tier {
                Tier::S0 => Tier::S1,
                Tier::S1 => Tier::S2,
                Tier::S2 => Tier::S2,
            };
            self.consecutive_failures = 0;
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PromotionPipeline {
    records: HashMap<u64, FingerprintRecord>,
}

impl PromotionPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a winning attempt. `attempt_index` is the zero-based index
    /// of this attempt within its solve (used for the "first-try" rule).
    pub fn record_success(&mut self, category: &str, description: &str, code: &str, strategy: Strategy, attempt_index: usize) {
        let key = fingerprint(category, description);
        let record = self.records.entry(key).or_insert_with(FingerprintRecord::new);
        record.push_snippet(code.to_string(), strategy);
        record.strategies_won.insert(strategy);
        record.total_wins += 1;
        record.consecutive_failures = 0;
        record.record_first_try_flag(attempt_index == 0);
        record.maybe_promote();
    }

    pub fn record_failure(&mut self, category: &str, description: &str, _tier: Tier) {
        let key = fingerprint(category, description);
        if let Some(record) = self.records.get_mut(&key) {
            record.consecutive_failures += 1;
            record.maybe_demote();
        }
    }

    /// A template for the deterministic tier, only returned once the
    /// fingerprint has reached S0.
    #[must_use]
    pub fn get_s0_template(&self, category: &str, description: &str) -> Option<&str> {
        let key = fingerprint(category, description);
        let record = self.records.get(&key)?;
        if record.tier != Tier::S0 {
            return None;
        }
        record.snippets.back().map(|s| s.code.as_str())
    }

    /// A cached solution for the procedural tier, returned once the
    /// fingerprint has reached S1 or higher.
    #[must_use]
    pub fn get_s1_solution(&self, category: &str, description: &str) -> Option<&str> {
        let key = fingerprint(category, description);
        let record = self.records.get(&key)?;
        if record.tier == Tier::S2 {
            return None;
        }
        record.snippets.back().map(|s| s.code.as_str())
    }

    #[must_use]
    pub fn tier_of(&self, category: &str, description: &str) -> Tier {
        let key = fingerprint(category, description);
        self.records.get(&key).map_or(Tier::S2, |r| r.tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_to_s1_after_three_wins_across_two_strategies() {
        let mut pipeline = PromotionPipeline::new();
        pipeline.record_success("io", "read two ints", "a", Strategy::Direct, 1);
        pipeline.record_success("io", "read two ints", "b", Strategy::WithHints, 1);
        pipeline.record_success("io", "read two ints", "c", Strategy::WithHints, 1);
        assert_eq!(pipeline.tier_of("io", "read two ints"), Tier::S1);
    }

    #[test]
    fn stays_at_s2_with_a_single_strategy() {
        let mut pipeline = PromotionPipeline::new();
        for _ in 0..10 {
            pipeline.record_success("io", "task", "a", Strategy::Direct, 1);
        }
        assert_eq!(pipeline.tier_of("io", "task"), Tier::S2);
    }

    #[test]
    fn promotes_to_s0_after_extra_wins_with_first_try_success() {
        let mut pipeline = PromotionPipeline::new();
        pipeline.record_success("io", "t", "a", Strategy::Direct, 1);
        pipeline.record_success("io", "t", "b", Strategy::WithHints, 1);
        pipeline.record_success("io", "t", "c", Strategy::WithHints, 0);
        for _ in 0..5 {
            pipeline.record_success("io", "t", "d", Strategy::WithHints, 3);
        }
        assert_eq!(pipeline.tier_of("io", "t"), Tier::S0);
        assert!(pipeline.get_s0_template("io", "t").is_some());
    }

    #[test]
    fn demotes_a_tier_after_three_consecutive_failures() {
        let mut pipeline = PromotionPipeline::new();
        pipeline.record_success("io", "t", "a", Strategy::Direct, 1);
        pipeline.record_success("io", "t", "b", Strategy::WithHints, 1);
        pipeline.record_success("io", "t", "c", Strategy::WithHints, 1);
        assert_eq!(pipeline.tier_of("io", "t"), Tier::S1);
        for _ in 0..3 {
            pipeline.record_failure("io", "t", Tier::S1);
        }
        assert_eq!(pipeline.tier_of("io", "t"), Tier::S2);
    }

    #[test]
    fn fingerprint_is_normalised_across_whitespace_and_case() {
        let mut pipeline = PromotionPipeline::new();
        pipeline.record_success("io", "Read   Two Ints", "a", Strategy::Direct, 0);
        assert_eq!(pipeline.tier_of("io", "read two ints"), Tier::S2);
        assert!(pipeline.get_s1_solution("io", "read two ints").is_none());
    }
}
