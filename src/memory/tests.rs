//! Integration-style tests for `EbbinghausMemory` against the in-memory
//! backend, mirroring the teacher's separate `memory_db/tests.rs` file
//! rather than an inline `#[cfg(test)]` module.

use std::collections::HashMap;

use super::backend::InMemoryBackend;
use super::{EbbinghausMemory, DECAY_THRESHOLD, TAU_SECONDS};

fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[tokio::test]
async fn store_then_recall_within_a_second_has_high_retention() {
    let mut mem = EbbinghausMemory::new(Box::new(InMemoryBackend::new()));
    let embedding = vec![1.0, 0.0, 0.0];
    let strength = EbbinghausMemory::initial_strength(10.0, 1.0, 1.0, 1.0);
    mem.store(embedding.clone(), "sum_two_numbers", strength, meta(&[("category", "arithmetic")])).await;

    let hits = mem.recall(&embedding, 5).await;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].retention > 0.99);
}

#[tokio::test]
async fn recall_never_returns_a_record_below_decay_threshold() {
    let mut mem = EbbinghausMemory::new(Box::new(InMemoryBackend::new()));
    // A very weak, never-recalled memory should decay below threshold
    // almost immediately given tau = 1 hour and strength near zero.
    let embedding = vec![0.0, 1.0, 0.0];
    let id = mem.store(embedding.clone(), "weak", 0.0001, meta(&[])).await;

    // Force its last_access far enough in the past that retention < threshold.
    if let Some(record) = mem.records.get_mut(&id) {
        record.last_access -= chrono::Duration::seconds(3600);
    }

    let hits = mem.recall(&embedding, 5).await;
    assert!(hits.iter().all(|h| h.retention >= DECAY_THRESHOLD));
    assert!(hits.is_empty());
}

#[tokio::test]
async fn recall_applies_spacing_effect_boost() {
    let mut mem = EbbinghausMemory::new(Box::new(InMemoryBackend::new()));
    let embedding = vec![1.0, 1.0, 0.0];
    let strength = EbbinghausMemory::initial_strength(10.0, 1.0, 1.0, 1.0);
    mem.store(embedding.clone(), "concept", strength, meta(&[])).await;

    let before = mem.recall(&embedding, 1).await;
    let strength_before = before[0].strength;
    let after = mem.recall(&embedding, 1).await;
    assert!(after[0].strength > strength_before);
}

#[tokio::test]
async fn garbage_collect_monotonically_shrinks_and_counts() {
    let mut mem = EbbinghausMemory::new(Box::new(InMemoryBackend::new()));
    let id = mem.store(vec![1.0, 0.0], "stale", 0.0001, meta(&[])).await;
    if let Some(record) = mem.records.get_mut(&id) {
        record.last_access -= chrono::Duration::seconds(36000);
    }
    mem.store(vec![0.0, 1.0], "fresh", 50.0, meta(&[])).await;

    let before_len = mem.len();
    let removed = mem.garbage_collect().await;
    assert_eq!(removed, 1);
    assert_eq!(mem.len(), before_len - 1);
    assert_eq!(mem.stats().total_decayed, 1);
}

#[tokio::test]
async fn retention_formula_matches_exp_decay() {
    let mut mem = EbbinghausMemory::new(Box::new(InMemoryBackend::new()));
    let id = mem.store(vec![1.0, 0.0], "c", 10.0, meta(&[])).await;
    let record = mem.get(id).unwrap().clone();

    let now = record.last_access + chrono::Duration::seconds(TAU_SECONDS as i64 * 10);
    let retention = record.retention_at(now, TAU_SECONDS);
    // delta = strength * tau exactly -> e^-1
    assert!((retention - std::f32::consts::E.recip()).abs() < 0.01);
}
