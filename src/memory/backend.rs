//! Vector-store backend trait and its two implementations.
//!
//! Grounded on `MemoryDb` (Qdrant-backed) from the teacher: the spec calls
//! for exactly this plurality — an external vector database and an
//! in-memory fallback sharing one method surface — so `VectorStoreBackend`
//! is the trait and `InMemoryBackend` / `QdrantBackend` are the two
//! implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{BackendHit, RecordMetadata};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("qdrant error: {0}")]
    Qdrant(#[from] qdrant_client::QdrantError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Maximum embedding dimension accepted by a backend. Per §6, larger
/// embeddings are downsampled uniformly by the caller before reaching
/// this trait.
pub const MAX_EMBEDDING_DIM: usize = 1024;

#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    async fn upsert(&mut self, id: Uuid, embedding: &[f32], metadata: RecordMetadata) -> BackendResult<()>;
    async fn query(&self, embedding: &[f32], k: usize) -> BackendResult<Vec<BackendHit>>;
    async fn update_metadata(&mut self, id: Uuid, metadata: RecordMetadata) -> BackendResult<()>;
    async fn delete(&mut self, ids: &[Uuid]) -> BackendResult<()>;
    async fn count(&self) -> BackendResult<usize>;
}

// ===========================================================================
// In-memory backend
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    id: Uuid,
    embedding: Vec<f32>,
    metadata: RecordMetadata,
}

/// Flat-array, linear-cosine-scan backend persisted as a single JSON blob.
/// Acceptable per the spec's note: retention-based garbage collection keeps
/// the active set small, so O(n) scan never becomes the bottleneck.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    points: Vec<StoredPoint>,
    persist_path: Option<PathBuf>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from (or start fresh alongside) a JSON file that subsequent
    /// writes persist to.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref().to_path_buf();
        let points = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self {
            points,
            persist_path: Some(path),
        })
    }

    fn persist(&self) {
        let Some(path) = &self.persist_path else {
            return;
        };
        match serde_json::to_string(&self.points) {
            Ok(data) => {
                if let Err(e) = std::fs::write(path, data) {
                    warn!(error = %e, "failed to persist in-memory vector backend");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize in-memory vector backend"),
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na < f32::EPSILON || nb < f32::EPSILON {
            0.0
        } else {
            dot / (na * nb)
        }
    }
}

#[async_trait]
impl VectorStoreBackend for InMemoryBackend {
    async fn upsert(&mut self, id: Uuid, embedding: &[f32], metadata: RecordMetadata) -> BackendResult<()> {
        if embedding.len() > MAX_EMBEDDING_DIM {
            return Err(BackendError::DimensionMismatch {
                expected: MAX_EMBEDDING_DIM,
                actual: embedding.len(),
            });
        }
        if let Some(existing) = self.points.iter_mut().find(|p| p.id == id) {
            existing.embedding = embedding.to_vec();
            existing.metadata = metadata;
        } else {
            self.points.push(StoredPoint {
                id,
                embedding: embedding.to_vec(),
                metadata,
            });
        }
        self.persist();
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> BackendResult<Vec<BackendHit>> {
        let mut scored: Vec<(f32, &StoredPoint)> = self
            .points
            .iter()
            .map(|p| (Self::cosine(embedding, &p.embedding), p))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(sim, p)| BackendHit {
                id: p.id,
                distance: 1.0 - sim,
                metadata: p.metadata.clone(),
                embedding: p.embedding.clone(),
            })
            .collect())
    }

    async fn update_metadata(&mut self, id: Uuid, metadata: RecordMetadata) -> BackendResult<()> {
        if let Some(point) = self.points.iter_mut().find(|p| p.id == id) {
            point.metadata = metadata;
            self.persist();
        }
        Ok(())
    }

    async fn delete(&mut self, ids: &[Uuid]) -> BackendResult<()> {
        self.points.retain(|p| !ids.contains(&p.id));
        self.persist();
        Ok(())
    }

    async fn count(&self) -> BackendResult<usize> {
        Ok(self.points.len())
    }
}

// ===========================================================================
// Qdrant-backed external backend
// ===========================================================================

const PAYLOAD_KEY: &str = "meta";

/// External vector-database backend. Approximate nearest-neighbour search
/// is acceptable here (the spec allows it); exactness is the in-memory
/// backend's job.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dim: u64,
}

impl QdrantBackend {
    /// Connect and ensure the collection exists.
    pub async fn connect(url: &str, collection: impl Into<String>, dim: u64) -> BackendResult<Self> {
        let client = Qdrant::from_url(url).build()?;
        let collection = collection.into();
        if !client.collection_exists(&collection).await? {
            client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine)),
                )
                .await?;
            debug!(collection = %collection, "created qdrant collection");
        }
        Ok(Self { client, collection, dim })
    }

    fn metadata_to_payload(metadata: &RecordMetadata) -> BackendResult<Payload> {
        let json = serde_json::to_value(metadata)?;
        let mut map = serde_json::Map::new();
        map.insert(PAYLOAD_KEY.to_string(), json);
        Ok(Payload::try_from(serde_json::Value::Object(map)).unwrap_or_default())
    }

    fn payload_to_metadata(payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>) -> RecordMetadata {
        payload
            .get(PAYLOAD_KEY)
            .and_then(|v| v.as_struct())
            .map(|s| {
                s.fields
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStoreBackend for QdrantBackend {
    async fn upsert(&mut self, id: Uuid, embedding: &[f32], metadata: RecordMetadata) -> BackendResult<()> {
        if embedding.len() as u64 != self.dim {
            return Err(BackendError::DimensionMismatch {
                expected: self.dim as usize,
                actual: embedding.len(),
            });
        }
        let payload = Self::metadata_to_payload(&metadata)?;
        let point = PointStruct::new(id.to_string(), embedding.to_vec(), payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> BackendResult<Vec<BackendHit>> {
        let response = self
            .client
            .search_points(SearchPointsBuilder::new(&self.collection, embedding.to_vec(), k as u64).with_payload(true))
            .await?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                let id = p.id.as_ref().and_then(|id| id.point_id_options.as_ref()).and_then(|opt| {
                    if let qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) = opt {
                        Uuid::parse_str(u).ok()
                    } else {
                        None
                    }
                })?;
                Some(BackendHit {
                    id,
                    distance: 1.0 - p.score,
                    metadata: Self::payload_to_metadata(&p.payload),
                    embedding: Vec::new(),
                })
            })
            .collect())
    }

    async fn update_metadata(&mut self, id: Uuid, metadata: RecordMetadata) -> BackendResult<()> {
        let payload = Self::metadata_to_payload(&metadata)?;
        let filter = Filter::must([Condition::has_id(vec![id.to_string().into()])]);
        self.client
            .overwrite_payload(
                qdrant_client::qdrant::SetPayloadPointsBuilder::new(&self.collection, payload).points_selector(filter),
            )
            .await?;
        Ok(())
    }

    async fn delete(&mut self, ids: &[Uuid]) -> BackendResult<()> {
        let point_ids: Vec<_> = ids.iter().map(|id| id.to_string().into()).collect();
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(point_ids))
            .await?;
        Ok(())
    }

    async fn count(&self) -> BackendResult<usize> {
        let response = self
            .client
            .scroll(ScrollPointsBuilder::new(&self.collection).limit(1))
            .await?;
        Ok(response.result.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_upsert_then_query_returns_exact_match_first() {
        let mut backend = InMemoryBackend::new();
        backend.upsert(Uuid::new_v4(), &[1.0, 0.0, 0.0], RecordMetadata::new()).await.unwrap();
        let target = Uuid::new_v4();
        backend.upsert(target, &[0.0, 1.0, 0.0], RecordMetadata::new()).await.unwrap();

        let hits = backend.query(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].id, target);
        assert!(hits[0].distance < 1e-5);
    }

    #[tokio::test]
    async fn in_memory_delete_removes_points() {
        let mut backend = InMemoryBackend::new();
        let id = Uuid::new_v4();
        backend.upsert(id, &[1.0, 0.0], RecordMetadata::new()).await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 1);
        backend.delete(&[id]).await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn in_memory_rejects_oversized_embeddings() {
        let mut backend = InMemoryBackend::new();
        let oversized = vec![0.0f32; MAX_EMBEDDING_DIM + 1];
        let err = backend.upsert(Uuid::new_v4(), &oversized, RecordMetadata::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::DimensionMismatch { .. }));
    }

    /// Integration test marker - requires running Qdrant.
    /// Run with: cargo test --features integration -- --ignored
    #[test]
    #[ignore = "Requires running Qdrant instance"]
    fn integration_qdrant_connect_and_round_trip() {
        tokio_test::block_on(async {
            let mut backend = QdrantBackend::connect("http://localhost:6334", "cascade-core-test", 3).await.unwrap();
            let id = Uuid::new_v4();
            backend.upsert(id, &[1.0, 0.0, 0.0], RecordMetadata::new()).await.unwrap();
            let hits = backend.query(&[1.0, 0.0, 0.0], 1).await.unwrap();
            assert_eq!(hits[0].id, id);
        });
    }
}
