//! Ebbinghaus episodic memory: vector-indexed store with retention decay.
//!
//! Grounded on `memory_db::MemoryDb` (the teacher's Qdrant-backed episodic
//! store), generalised from TMI's "memories"/"episodes"/"identity"
//! collections to the spec's single episodic-record stream with a
//! pluggable backend (§6, §9 "Backend plurality").

pub mod backend;
pub mod types;

#[cfg(test)]
mod tests;

use chrono::Utc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub use backend::{BackendError, InMemoryBackend, QdrantBackend, VectorStoreBackend};
pub use types::{EpisodicRecord, RecallHit, RecordId, RecordMetadata};

/// One hour, in seconds: the Ebbinghaus time constant `tau`.
pub const TAU_SECONDS: f32 = 3600.0;

/// Below this retention, a record is eligible for garbage collection.
pub const DECAY_THRESHOLD: f32 = 0.02;

/// Spacing-effect multiplier applied to strength on recall.
pub const SPACING_MULTIPLIER: f32 = 1.5;

/// Upper bound on strength growth (see `SPEC_FULL.md` Open Questions: the
/// spacing-effect recall boost and NREM consolidation boost can compound
/// under heavy recall; capping avoids unbounded growth).
pub const MAX_STRENGTH: f32 = 100.0;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Outcome of a backend operation, reported rather than raised per §7:
/// "Backend errors are caught and reported as (ok=false, reason) in
/// stats; store/recall return sentinel empty results rather than
/// raising."
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub total_stored: u64,
    pub total_recalled: u64,
    pub total_decayed: u64,
    pub last_backend_ok: bool,
    pub last_backend_reason: Option<String>,
}

/// Episodic memory with Ebbinghaus-style retention decay, backed by a
/// pluggable [`VectorStoreBackend`].
pub struct EbbinghausMemory {
    backend: Box<dyn VectorStoreBackend>,
    /// Local index of full record metadata, mirroring what's pushed to the
    /// backend. The backend's payload only carries string metadata; the
    /// richer [`EpisodicRecord`] (strength, timestamps, access_count)
    /// lives here so retention math doesn't round-trip through JSON on
    /// every recall.
    records: std::collections::HashMap<RecordId, EpisodicRecord>,
    decay_threshold: f32,
    stats: MemoryStats,
}

impl EbbinghausMemory {
    #[must_use]
    pub fn new(backend: Box<dyn VectorStoreBackend>) -> Self {
        Self {
            backend,
            records: std::collections::HashMap::new(),
            decay_threshold: DECAY_THRESHOLD,
            stats: MemoryStats {
                last_backend_ok: true,
                ..Default::default()
            },
        }
    }

    #[must_use]
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// Compute an initial strength from the caller's task difficulty
    /// (`priority`), evaluator score (`quality`), and category rarity
    /// (`durability`): `base * priority * quality * durability`, with
    /// `base` chosen by the caller per outcome class (10 = fresh correct
    /// solution, 3 = partial, 0.5 = failure).
    #[must_use]
    pub fn initial_strength(base: f32, priority: f32, quality: f32, durability: f32) -> f32 {
        (base * priority * quality * durability).max(f32::EPSILON)
    }

    /// Insert a new record. Never raises: backend failures are recorded in
    /// [`MemoryStats`] and an empty-but-valid id is still returned so the
    /// executor can proceed (the record simply won't be recallable).
    pub async fn store(&mut self, embedding: Vec<f32>, concept: &str, strength: f32, metadata: RecordMetadata) -> RecordId {
        let record = EpisodicRecord::new(embedding.clone(), concept.to_string(), strength.max(f32::EPSILON), metadata.clone());
        let id = record.id;

        match self.backend.upsert(id.0, &embedding, metadata).await {
            Ok(()) => {
                self.stats.last_backend_ok = true;
                self.stats.last_backend_reason = None;
            }
            Err(e) => {
                warn!(error = %e, "episodic backend upsert failed");
                self.stats.last_backend_ok = false;
                self.stats.last_backend_reason = Some(e.to_string());
            }
        }

        self.records.insert(id, record);
        self.stats.total_stored += 1;
        id
    }

    /// Recall up to `n` records by cosine proximity to `query`, retaining
    /// only those whose retention (computed *now*, before the spacing
    /// boost below) is at or above the decay threshold. Every returned
    /// record's strength is then multiplied by the spacing-effect factor
    /// and its `last_access` is bumped to now.
    pub async fn recall(&mut self, query: &[f32], n: usize) -> Vec<RecallHit> {
        let hits = match self.backend.query(query, n.max(1) * 4).await {
            Ok(hits) => {
                self.stats.last_backend_ok = true;
                hits
            }
            Err(e) => {
                warn!(error = %e, "episodic backend query failed");
                self.stats.last_backend_ok = false;
                self.stats.last_backend_reason = Some(e.to_string());
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut out = Vec::new();
        for hit in hits {
            let id = RecordId(hit.id);
            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };
            let retention = record.retention_at(now, TAU_SECONDS);
            if retention < self.decay_threshold {
                continue;
            }

            record.strength = (record.strength * SPACING_MULTIPLIER).min(MAX_STRENGTH);
            record.last_access = now;
            record.access_count += 1;

            out.push(RecallHit {
                id,
                concept_name: record.concept_name.clone(),
                strength: record.strength,
                retention,
                distance: hit.distance,
                metadata: record.metadata.clone(),
            });

            if out.len() >= n {
                break;
            }
        }

        self.stats.total_recalled += out.len() as u64;
        out
    }

    /// Delete every record whose current retention is below the decay
    /// threshold. Returns the number removed; `total_decayed` increases by
    /// exactly that count.
    pub async fn garbage_collect(&mut self) -> usize {
        let now = Utc::now();
        let stale: Vec<RecordId> = self
            .records
            .iter()
            .filter(|(_, r)| r.retention_at(now, TAU_SECONDS) < self.decay_threshold)
            .map(|(id, _)| *id)
            .collect();

        if stale.is_empty() {
            return 0;
        }

        let ids: Vec<Uuid> = stale.iter().map(|id| id.0).collect();
        if let Err(e) = self.backend.delete(&ids).await {
            warn!(error = %e, "episodic backend delete failed during gc");
            self.stats.last_backend_ok = false;
            self.stats.last_backend_reason = Some(e.to_string());
        }

        for id in &stale {
            self.records.remove(id);
        }
        self.stats.total_decayed += stale.len() as u64;
        stale.len()
    }

    /// Apply a strength multiplier directly, used by sleep consolidation.
    /// Deletes the record (from both the local index and the backend) if
    /// the resulting strength drops below `delete_below`.
    pub async fn adjust_strength(&mut self, id: RecordId, multiplier: f32, delete_below: f32) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.strength = (record.strength * multiplier).min(MAX_STRENGTH);
        if record.strength < delete_below {
            self.records.remove(&id);
            if let Err(e) = self.backend.delete(&[id.0]).await {
                warn!(error = %e, "episodic backend delete failed during consolidation");
            }
            return true;
        }
        false
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&EpisodicRecord> {
        self.records.get(&id)
    }

    #[must_use]
    pub fn all_ids(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
