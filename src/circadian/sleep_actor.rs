//! Sleep-phase consolidation as a supervised `ractor` actor.
//!
//! Grounded on `actors::sleep::types::{SleepState, SleepConfig}` (this
//! shape of idle/cycle/consolidation/association constants) and
//! `actors::continuity::ContinuityActor`'s `Actor` implementation
//! (`pre_start` builds state, `handle` matches on a message enum with
//! `RpcReplyPort` fields). The actor here owns no cognitive state itself:
//! `Core` ships it a snapshot of what needs replaying and applies the
//! returned adjustments itself, per the concurrency model's "no lock
//! needed inside one core" rule.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};

use crate::hdc::hypervector::Hypervector;
use crate::memory::RecordId;

/// Fraction of importance that consolidation uses to decide whether a
/// record is strengthened rather than weakened (§4.6 NREM rule).
const IMPORTANCE_STRENGTHEN: f32 = 0.5;
const IMPORTANCE_WEAKEN: f32 = 0.2;
const WEAK_STRENGTH_CEILING: f32 = 2.0;
const DELETE_BELOW: f32 = 0.1;
const NREM_DECAY: f32 = 0.7;

/// One record's stats as seen by the sleep actor, a minimal snapshot
/// rather than the full `EpisodicRecord`.
#[derive(Debug, Clone, Copy)]
pub struct ReplayRecord {
    pub id: RecordId,
    pub score: f32,
    pub access_count: u32,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct StrengthAdjustment {
    pub id: RecordId,
    pub multiplier: f32,
    pub delete: bool,
}

fn importance(score: f32, access_count: u32) -> f32 {
    0.6 * score + 0.4 * (access_count.min(10) as f32 / 10.0)
}

fn nrem_pass(records: &[ReplayRecord], consolidation_strength: f32) -> Vec<StrengthAdjustment> {
    records
        .iter()
        .filter_map(|r| {
            let imp = importance(r.score, r.access_count);
            if imp > IMPORTANCE_STRENGTHEN {
                Some(StrengthAdjustment {
                    id: r.id,
                    multiplier: 1.0 + consolidation_strength * imp * 0.3,
                    delete: false,
                })
            } else if imp < IMPORTANCE_WEAKEN && r.strength < WEAK_STRENGTH_CEILING {
                let new_strength = r.strength * NREM_DECAY;
                Some(StrengthAdjustment {
                    id: r.id,
                    multiplier: NREM_DECAY,
                    delete: new_strength < DELETE_BELOW,
                })
            } else {
                None
            }
        })
        .collect()
}

/// One concept's snapshot as seen by the sleep actor during a REM pass.
#[derive(Debug, Clone)]
pub struct ConceptSnapshot {
    pub name: String,
    pub prototype: Hypervector,
    pub has_code: bool,
}

#[derive(Debug, Clone)]
pub struct DreamPair {
    pub concept_a: String,
    pub concept_b: String,
    pub novelty: f32,
    pub coherence: f32,
    pub insight_potential: f32,
}

impl DreamPair {
    #[must_use]
    pub fn is_insight(&self) -> bool {
        self.insight_potential > 0.6
    }
}

fn rem_pass(concepts: &[ConceptSnapshot], rem_intensity: f32, rng: &mut ChaCha8Rng) -> Vec<DreamPair> {
    if concepts.len() < 2 {
        return Vec::new();
    }
    let target_pairs = ((rem_intensity * 10.0).round() as usize).max(1);
    let mut indices: Vec<usize> = (0..concepts.len()).collect();
    let mut pairs = Vec::with_capacity(target_pairs);

    for _ in 0..target_pairs {
        indices.shuffle(rng);
        let (a, b) = (indices[0], indices[1 % indices.len()]);
        if a == b {
            continue;
        }
        let concept_a = &concepts[a];
        let concept_b = &concepts[b];
        let novelty = 1.0 - concept_a.prototype.cosine(&concept_b.prototype);
        let coherence = if concept_a.has_code && concept_b.has_code { 1.0 } else { 0.3 };
        let insight_potential = (novelty * 0.6 + coherence * 0.4).clamp(0.0, 1.0);

        pairs.push(DreamPair {
            concept_a: concept_a.name.clone(),
            concept_b: concept_b.name.clone(),
            novelty,
            coherence,
            insight_potential,
        });
    }
    pairs
}

#[derive(Debug)]
pub enum SleepMessage {
    RunNrem {
        records: Vec<ReplayRecord>,
        consolidation_strength: f32,
        reply: RpcReplyPort<Vec<StrengthAdjustment>>,
    },
    RunRem {
        concepts: Vec<ConceptSnapshot>,
        rem_intensity: f32,
        reply: RpcReplyPort<Vec<DreamPair>>,
    },
}

pub struct SleepActorState {
    rng: ChaCha8Rng,
    cycles_run: u64,
}

/// A supervised actor running one night's worth of NREM/REM passes. Spawn
/// once per process; `Core` calls it synchronously between solves.
pub struct SleepActor;

#[ractor::async_trait]
impl Actor for SleepActor {
    type Msg = SleepMessage;
    type State = SleepActorState;
    type Arguments = u64;

    async fn pre_start(&self, _myself: ActorRef<Self::Msg>, seed: Self::Arguments) -> Result<Self::State, ActorProcessingErr> {
        Ok(SleepActorState {
            rng: ChaCha8Rng::seed_from_u64(seed),
            cycles_run: 0,
        })
    }

    async fn handle(&self, _myself: ActorRef<Self::Msg>, message: Self::Msg, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        match message {
            SleepMessage::RunNrem {
                records,
                consolidation_strength,
                reply,
            } => {
                let adjustments = nrem_pass(&records, consolidation_strength);
                state.cycles_run += 1;
                let _ = reply.send(adjustments);
            }
            SleepMessage::RunRem { concepts, rem_intensity, reply } => {
                let pairs = rem_pass(&concepts, rem_intensity, &mut state.rng);
                let _ = reply.send(pairs);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: RecordId, score: f32, access_count: u32, strength: f32) -> ReplayRecord {
        ReplayRecord { id, score, access_count, strength }
    }

    #[test]
    fn high_importance_records_are_strengthened() {
        let id = RecordId::new();
        let records = vec![record(id, 0.9, 10, 5.0)];
        let adjustments = nrem_pass(&records, 1.0);
        assert_eq!(adjustments.len(), 1);
        assert!(adjustments[0].multiplier > 1.0);
        assert!(!adjustments[0].delete);
    }

    #[test]
    fn low_importance_weak_records_decay_and_may_delete() {
        let id = RecordId::new();
        let records = vec![record(id, 0.0, 0, 0.1)];
        let adjustments = nrem_pass(&records, 1.0);
        assert_eq!(adjustments.len(), 1);
        assert!(adjustments[0].delete);
    }

    #[test]
    fn middling_importance_is_left_untouched() {
        let id = RecordId::new();
        let records = vec![record(id, 0.35, 5, 3.0)];
        assert!(nrem_pass(&records, 1.0).is_empty());
    }

    #[test]
    fn rem_pass_yields_roughly_intensity_scaled_pairs() {
        let concepts: Vec<ConceptSnapshot> = (0..5)
            .map(|i| ConceptSnapshot {
                name: format!("c{i}"),
                prototype: Hypervector::from_values(vec![i as f32, 1.0, 0.0]),
                has_code: i % 2 == 0,
            })
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pairs = rem_pass(&concepts, 0.5, &mut rng);
        assert!(pairs.len() <= 5);
        assert!(!pairs.is_empty());
    }

    #[test]
    fn rem_pass_with_fewer_than_two_concepts_is_empty() {
        let concepts = vec![ConceptSnapshot {
            name: "solo".to_string(),
            prototype: Hypervector::zeros(3),
            has_code: true,
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(rem_pass(&concepts, 1.0, &mut rng).is_empty());
    }
}
