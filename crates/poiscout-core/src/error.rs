//! Error taxonomy shared by the engine crates.

use std::time::Duration;

use thiserror::Error;

/// An external capability (planner, executor, reflection, summarization,
/// embedding, question generation) failed or timed out.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{capability} failed: {message}")]
    Failed {
        capability: &'static str,
        message: String,
    },
    #[error("{capability} timed out after {}ms", .after.as_millis())]
    TimedOut {
        capability: &'static str,
        after: Duration,
    },
    #[error("{capability} returned malformed output: {message}")]
    Malformed {
        capability: &'static str,
        message: String,
    },
}

impl CapabilityError {
    /// Wrap an `anyhow` error coming back from a capability implementation.
    pub fn failed(capability: &'static str, err: anyhow::Error) -> Self {
        Self::Failed {
            capability,
            message: format!("{:#}", err),
        }
    }

    pub fn malformed(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            capability,
            message: message.into(),
        }
    }

    pub fn capability(&self) -> &'static str {
        match self {
            Self::Failed { capability, .. }
            | Self::TimedOut { capability, .. }
            | Self::Malformed { capability, .. } => capability,
        }
    }
}

/// Data that cannot be trusted. Always reported, never repaired in place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityViolation {
    #[error("POI '{id}' seen again with conflicting attributes {keys:?}")]
    ConflictingPoi { id: String, keys: Vec<String> },
    #[error("malformed decision tree '{task_id}': {reason}")]
    MalformedTree { task_id: String, reason: String },
    #[error("corrupt skill document '{id}': {reason}")]
    CorruptSkill { id: String, reason: String },
}
