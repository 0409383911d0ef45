use poiscout_core::IntegrityViolation;
use poiscout_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectorError {
    /// The session cannot take the requested step (already at a leaf,
    /// replay past a leaf, answers that do not fit, unknown node).
    #[error("invalid session state for task '{task_id}': {reason}")]
    InvalidSessionState { task_id: String, reason: String },
    #[error(transparent)]
    Integrity(#[from] IntegrityViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode decision tree '{task_id}': {source}")]
    Encode {
        task_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SelectorError {
    pub(crate) fn invalid(task_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSessionState {
            task_id: task_id.to_string(),
            reason: reason.into(),
        }
    }
}
