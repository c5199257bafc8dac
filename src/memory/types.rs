//! Episodic record type and the metadata carried alongside each embedding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for an episodic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-form metadata attached to a record (task category, difficulty,
/// winning code, strategy, etc). Kept as a string map rather than a typed
/// struct because the executor, the promotion pipeline, and sleep
/// consolidation each read different subsets of it.
pub type RecordMetadata = HashMap<String, String>;

/// One stored episode: an embedding plus everything needed to compute
/// retention and drive consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicRecord {
    pub id: RecordId,
    pub embedding: Vec<f32>,
    pub concept_name: String,
    pub strength: f32,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub access_count: u64,
    pub metadata: RecordMetadata,
}

impl EpisodicRecord {
    #[must_use]
    pub fn new(embedding: Vec<f32>, concept_name: String, strength: f32, metadata: RecordMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            embedding,
            concept_name,
            strength,
            created_at: now,
            last_access: now,
            access_count: 0,
            metadata,
        }
    }

    /// Retention at `now`: `exp(-(now - last_access) / (strength * tau))`.
    #[must_use]
    pub fn retention_at(&self, now: DateTime<Utc>, tau_seconds: f32) -> f32 {
        let delta = (now - self.last_access).num_milliseconds() as f32 / 1000.0;
        let delta = delta.max(0.0);
        let denom = (self.strength * tau_seconds).max(f32::EPSILON);
        (-delta / denom).exp()
    }
}

/// A single hit returned from a backend query: id, distance (1 - cosine,
/// so 0 is identical), and the metadata stored alongside the vector.
#[derive(Debug, Clone)]
pub struct BackendHit {
    pub id: Uuid,
    pub distance: f32,
    pub metadata: RecordMetadata,
    pub embedding: Vec<f32>,
}

/// One recalled record, as returned by [`crate::memory::EbbinghausMemory::recall`].
#[derive(Debug, Clone)]
pub struct RecallHit {
    pub id: RecordId,
    pub concept_name: String,
    pub strength: f32,
    pub retention: f32,
    pub distance: f32,
    pub metadata: RecordMetadata,
}
