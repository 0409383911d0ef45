use poiscout_core::{CapabilityError, IntegrityViolation};
use poiscout_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Integrity(#[from] IntegrityViolation),
    #[error("embedding dimension mismatch: library uses {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("skill '{0}' has an empty embedding")]
    EmptyEmbedding(String),
    #[error("skill '{0}' has a non-finite embedding value")]
    NonFiniteEmbedding(String),
    #[error("skill library lock poisoned")]
    Poisoned,
}

/// A capability failed while distilling. Not fatal to the task: the caller
/// simply gets no new skill.
#[derive(Debug, Error)]
#[error("distillation skipped for task '{task_id}': {source}")]
pub struct DistillationSkipped {
    pub task_id: String,
    #[source]
    pub source: CapabilityError,
}
