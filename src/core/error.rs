//! The crate-root error, aggregating each subsystem's own `thiserror`
//! enum at the `Core::solve`/checkpoint boundary. The teacher has no
//! single root error type of its own (each module propagates its own
//! enum independently); this aggregate is a supplement grounded in the
//! same per-module `thiserror` idiom, added so the top-level entry
//! points have one error type to return.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("persistence error: {0}")]
    Persistence(#[from] crate::persistence::PersistenceError),

    #[error("concept memory error: {0}")]
    ConceptMemory(#[from] crate::hdc::concept_memory::ConceptMemoryError),

    #[error("sleep cycle error: {0}")]
    Sleep(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
