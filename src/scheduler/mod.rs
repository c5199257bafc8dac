//! Spaced-repetition scheduler: an SM-2-inspired interval/easiness record
//! per category, plus the priority formula used to pick what to review.
//!
//! Grounded on `hdc::concept_memory::Concept`'s per-name record map
//! (`HashMap<String, _>` keyed the same way, `sample_count`-style
//! bookkeeping) applied to SM-2 scheduling state instead of prototype
//! vectors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const MIN_INTERVAL_SECONDS: f64 = 120.0;
const MAX_INTERVAL_SECONDS: f64 = 86_400.0;
const MIN_EASINESS: f32 = 1.3;
/// Inject a review batch every 4th top-level batch.
pub const REVIEW_INJECTION_PERIOD: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub repetition_count: u32,
    pub easiness_factor: f32,
    pub interval_seconds: f64,
    pub last_reviewed_at: Option<f64>,
    pub recent_solve_rate: f32,
    pub consecutive_failures: u32,
    pub attempts: u32,
}

impl Default for CategoryRecord {
    fn default() -> Self {
        Self {
            repetition_count: 0,
            easiness_factor: 2.5,
            interval_seconds: MIN_INTERVAL_SECONDS,
            last_reviewed_at: None,
            recent_solve_rate: 0.5,
            consecutive_failures: 0,
            attempts: 0,
        }
    }
}

impl CategoryRecord {
    fn quality(&self) -> f32 {
        self.recent_solve_rate * 5.0
    }

    fn on_success(&mut self, now_seconds: f64) {
        let q = self.quality();
        self.easiness_factor = (self.easiness_factor + 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)).max(MIN_EASINESS);

        self.interval_seconds = match self.repetition_count {
            0 => 300.0,
            1 => 600.0,
            _ => self.interval_seconds * self.easiness_factor as f64,
        }
        .clamp(MIN_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS);

        self.repetition_count += 1;
        self.consecutive_failures = 0;
        self.last_reviewed_at = Some(now_seconds);
        self.attempts += 1;
    }

    fn on_failure(&mut self, now_seconds: f64) {
        self.repetition_count = 0;
        self.interval_seconds = (self.interval_seconds * 0.4).max(MIN_INTERVAL_SECONDS);
        self.consecutive_failures += 1;
        self.last_reviewed_at = Some(now_seconds);
        self.attempts += 1;
    }

    /// `priority = weakness · urgency · zone_bonus · fail_bonus · staleness`.
    fn priority(&self, now_seconds: f64) -> f32 {
        let weakness = 1.0 - self.recent_solve_rate;
        let overdue_ratio = self.last_reviewed_at.map_or(2.0, |last| ((now_seconds - last) / self.interval_seconds) as f32);
        let urgency = sigmoid(2.0 * (overdue_ratio - 1.0));
        let zone_bonus = if (0.3..=0.7).contains(&self.recent_solve_rate) { 2.0 } else { 1.0 };
        let fail_bonus = 1.0 + (self.consecutive_failures as f32 * 0.3).min(1.5);
        let staleness = if self.attempts < 3 { 0.5 } else { 1.0 };
        weakness * urgency * zone_bonus * fail_bonus * staleness
    }

    fn is_due(&self, now_seconds: f64) -> bool {
        self.last_reviewed_at.map_or(true, |last| now_seconds - last >= self.interval_seconds)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Scheduler {
    records: HashMap<String, CategoryRecord>,
    batches_seen: u32,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, category: &str, solved: bool, now_seconds: f64) {
        let record = self.records.entry(category.to_string()).or_default();
        // EWMA over the recent solve rate, consistent with the momentum
        // signal's smoothing in the gut aggregator.
        record.recent_solve_rate = 0.8 * record.recent_solve_rate + 0.2 * if solved { 1.0 } else { 0.0 };
        if solved {
            record.on_success(now_seconds);
        } else {
            record.on_failure(now_seconds);
        }
    }

    /// Categories currently due for review, sorted by descending priority.
    #[must_use]
    pub fn due_categories(&self, now_seconds: f64) -> Vec<(String, f32)> {
        let mut due: Vec<(String, f32)> = self
            .records
            .iter()
            .filter(|(_, r)| r.is_due(now_seconds))
            .map(|(name, r)| (name.clone(), r.priority(now_seconds)))
            .collect();
        due.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        due
    }

    /// Call once per top-level batch; returns `true` on the batches a
    /// review injection should happen, i.e. every 4th batch with at least
    /// one due category.
    pub fn should_inject_review(&mut self, now_seconds: f64) -> bool {
        self.batches_seen += 1;
        self.batches_seen % REVIEW_INJECTION_PERIOD == 0 && !self.due_categories(now_seconds).is_empty()
    }

    #[must_use]
    pub fn record(&self, category: &str) -> Option<&CategoryRecord> {
        self.records.get(category)
    }
}
