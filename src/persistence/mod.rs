//! File-based persistence for the circadian clock and spaced-repetition
//! scheduler, so a restart resumes close to where it left off.
//!
//! Grounded on the teacher's `MemoryStore` save/load-JSON pattern
//! (`save_json`/`load_json` helpers around a single backing store),
//! generalised from a Redis connection to a local JSON file per state
//! kind since the concurrency model runs one core, single-threaded, with
//! no shared external store to coordinate.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::circadian::CircadianClock;
use crate::resilience::checkpoint::Checkpoint;
use crate::scheduler::Scheduler;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable storage for the two pieces of cross-restart state the spec
/// calls out: circadian progress and the spaced-repetition schedule.
/// Abstracted behind a trait so tests can swap in an in-memory store.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_circadian(&self, clock: &CircadianClock) -> Result<(), PersistenceError>;
    async fn load_circadian(&self) -> Result<Option<CircadianClock>, PersistenceError>;

    async fn save_scheduler(&self, scheduler: &Scheduler) -> Result<(), PersistenceError>;
    async fn load_scheduler(&self) -> Result<Option<Scheduler>, PersistenceError>;

    /// Persist the most recent periodic checkpoint, for diagnostics and
    /// for a restart to report how far the last run got.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), PersistenceError>;
    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>, PersistenceError>;
}

/// JSON-file-backed [`StateStore`]: one file per state kind under a
/// configured directory.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    async fn save_json<T: Serialize + Sync>(&self, name: &str, value: &T) -> Result<(), PersistenceError> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| PersistenceError::Io { path: path.clone(), source })?;
        }
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, json).await.map_err(|source| PersistenceError::Io { path: path.clone(), source })?;
        debug!(path = %path.display(), "saved state file");
        Ok(())
    }

    async fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.path_for(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => {
                warn!(path = %path.display(), error = %source, "failed to read state file");
                Err(PersistenceError::Io { path, source })
            }
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn save_circadian(&self, clock: &CircadianClock) -> Result<(), PersistenceError> {
        self.save_json("circadian", clock).await
    }

    async fn load_circadian(&self) -> Result<Option<CircadianClock>, PersistenceError> {
        self.load_json("circadian").await
    }

    async fn save_scheduler(&self, scheduler: &Scheduler) -> Result<(), PersistenceError> {
        self.save_json("scheduler", scheduler).await
    }

    async fn load_scheduler(&self) -> Result<Option<Scheduler>, PersistenceError> {
        self.load_json("scheduler").await
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), PersistenceError> {
        self.save_json("checkpoint", checkpoint).await
    }

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>, PersistenceError> {
        self.load_json("checkpoint").await
    }
}

#[must_use]
pub fn default_state_dir() -> PathBuf {
    Path::new("state").to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cascade-core-test-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn circadian_round_trips_through_a_file() {
        let dir = temp_dir("circadian");
        let store = FileStateStore::new(&dir);

        assert!(store.load_circadian().await.unwrap().is_none());

        let clock = CircadianClock::new(48);
        store.save_circadian(&clock).await.unwrap();

        let loaded = store.load_circadian().await.unwrap().expect("just saved");
        assert_eq!(loaded.get_state().batch_in_day, clock.get_state().batch_in_day);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn scheduler_round_trips_through_a_file() {
        let dir = temp_dir("scheduler");
        let store = FileStateStore::new(&dir);

        let mut scheduler = Scheduler::new();
        scheduler.record_outcome("arrays", true, 0.0);
        store.save_scheduler(&scheduler).await.unwrap();

        let loaded = store.load_scheduler().await.unwrap().expect("just saved");
        assert!(loaded.record("arrays").is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_loads_as_none_rather_than_erroring() {
        let dir = temp_dir("missing");
        let store = FileStateStore::new(&dir);
        assert!(store.load_scheduler().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_round_trips_through_a_file() {
        let dir = temp_dir("checkpoint");
        let store = FileStateStore::new(&dir);

        assert!(store.load_checkpoint().await.unwrap().is_none());

        let checkpoint = Checkpoint::new(200, "midday", 0.3, 2);
        store.save_checkpoint(&checkpoint).await.unwrap();

        let loaded = store.load_checkpoint().await.unwrap().expect("just saved");
        assert_eq!(loaded.sequence, 2);
        assert_eq!(loaded.circadian_phase, "midday");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
