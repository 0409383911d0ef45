//! Distilled natural-language search skills.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable piece of search guidance. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub source_task_id: String,
    pub created_at: DateTime<Utc>,
}

impl Skill {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        source_task_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            source_task_id: source_task_id.into(),
            created_at: Utc::now(),
        }
    }
}
