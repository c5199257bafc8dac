//! The LLM external collaborator, plus the throttle and prompt cache
//! wrapped around it by the S2 generation tier.
//!
//! Grounded on `api::rate_limit`'s counter/backoff shape (the teacher's
//! Redis-backed per-key rate limiter), adapted to a single in-process
//! adaptive gap since the core never runs two solves concurrently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

const BASE_GAP: Duration = Duration::from_millis(4_000);
const BACKOFF_STEP: Duration = Duration::from_millis(500);
const MAX_GAP: Duration = Duration::from_millis(14_000);
const CACHE_TTL_HOURS: i64 = 24;

/// Outcome of one LLM call: model text, or none on failure, with the
/// rate-limit flag surfaced so the throttle can observe it (§6).
#[derive(Debug, Clone)]
pub enum LlmOutcome {
    Text(String),
    RateLimited,
    Failed,
}

impl LlmOutcome {
    #[must_use]
    pub fn text(self) -> Option<String> {
        match self {
            LlmOutcome::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn call(&self, prompt: &str, temperature: f32) -> LlmOutcome;
}

/// Adaptive inter-call gap: grows with observed 429s, shrinks back toward
/// baseline on clean calls.
#[derive(Debug)]
pub struct Throttle {
    gap: Duration,
    last_call: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            gap: BASE_GAP,
            last_call: None,
        }
    }
}

impl Throttle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current_gap(&self) -> Duration {
        self.gap
    }

    /// Sleep until the next call is permitted, then record the call time.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.gap {
                tokio::time::sleep(self.gap - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }

    /// Widen the gap after an observed rate-limit event, capped at
    /// [`MAX_GAP`].
    pub fn record_rate_limit(&mut self) {
        self.gap = (self.gap + BACKOFF_STEP).min(MAX_GAP);
    }

    /// Relax the gap by half a step toward the base gap on a clean call.
    pub fn record_success(&mut self) {
        if self.gap > BASE_GAP {
            self.gap = (self.gap.saturating_sub(BACKOFF_STEP / 2)).max(BASE_GAP);
        }
    }
}

fn cache_key(prompt: &str, temperature: f32) -> u64 {
    let bucket = (temperature * 10.0).round() as i32;
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(bucket.to_le_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[0..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

/// Bounded response cache keyed by `(prompt, temperature bucket)` with a
/// 24h TTL, short-circuiting duplicate S2 prompts.
#[derive(Debug, Default)]
pub struct PromptCache {
    entries: HashMap<u64, (String, DateTime<Utc>)>,
}

impl PromptCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, prompt: &str, temperature: f32) -> Option<String> {
        let key = cache_key(prompt, temperature);
        let (text, stored_at) = self.entries.get(&key)?;
        if Utc::now().signed_duration_since(*stored_at).num_hours() < CACHE_TTL_HOURS {
            Some(text.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, prompt: &str, temperature: f32, response: String) {
        let key = cache_key(prompt, temperature);
        self.entries.insert(key, (response, Utc::now()));
    }

    /// Drop every entry older than the TTL.
    pub fn evict_expired(&mut self) {
        let now = Utc::now();
        self.entries.retain(|_, (_, stored_at)| now.signed_duration_since(*stored_at).num_hours() < CACHE_TTL_HOURS);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_starts_at_base_gap() {
        let throttle = Throttle::new();
        assert_eq!(throttle.current_gap(), BASE_GAP);
    }

    #[test]
    fn rate_limit_widens_gap_up_to_cap() {
        let mut throttle = Throttle::new();
        for _ in 0..100 {
            throttle.record_rate_limit();
        }
        assert_eq!(throttle.current_gap(), MAX_GAP);
    }

    #[test]
    fn success_relaxes_gap_back_toward_base() {
        let mut throttle = Throttle::new();
        for _ in 0..5 {
            throttle.record_rate_limit();
        }
        let widened = throttle.current_gap();
        for _ in 0..20 {
            throttle.record_success();
        }
        assert!(throttle.current_gap() < widened);
        assert_eq!(throttle.current_gap(), BASE_GAP);
    }

    #[test]
    fn cache_round_trips_a_fresh_entry() {
        let mut cache = PromptCache::new();
        cache.insert("write a function", 0.5, "def f(): pass".to_string());
        assert_eq!(cache.get("write a function", 0.5).as_deref(), Some("def f(): pass"));
    }

    #[test]
    fn cache_misses_on_different_temperature_bucket() {
        let mut cache = PromptCache::new();
        cache.insert("write a function", 0.1, "a".to_string());
        assert!(cache.get("write a function", 0.9).is_none());
    }
}
