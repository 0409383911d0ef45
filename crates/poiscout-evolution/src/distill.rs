//! Offline distiller: trajectory → delta → summarized skill text → embedded skill.

use std::sync::Arc;

use poiscout_core::capability::{Embedder, Summarizer};
use poiscout_core::config::LibraryConfig;
use poiscout_core::{CancelFlag, CapabilityError, OptimizationTrajectory, Skill};

use crate::delta::TrajectoryDelta;
use crate::error::{DistillationSkipped, LibraryError};
use crate::library::SkillLibrary;

/// What happened to a trajectory submitted for distillation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing worth learning (too short, no delta, below the gain gate,
    /// empty summary, or cancelled).
    NoSkill,
    Accepted(Skill),
    /// Distilled, but too close to an existing skill.
    Rejected(Skill),
}

pub struct Distiller {
    summarizer: Arc<dyn Summarizer>,
    embedder: Arc<dyn Embedder>,
    min_gain_ratio: f64,
    cancel: CancelFlag,
}

impl Distiller {
    pub fn new(summarizer: Arc<dyn Summarizer>, embedder: Arc<dyn Embedder>, config: &LibraryConfig) -> Self {
        Self {
            summarizer,
            embedder,
            min_gain_ratio: config.min_gain_ratio,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Distill at most one skill from `trajectory`.
    ///
    /// `Ok(None)` is the normal empty outcome. Only a summarization or
    /// embedding failure is an error.
    pub async fn distill(
        &self,
        trajectory: &OptimizationTrajectory,
    ) -> Result<Option<Skill>, DistillationSkipped> {
        let task_id = trajectory.task_id.as_str();
        if trajectory.iterations < 1 {
            tracing::debug!(task = task_id, "trajectory too short to distill");
            return Ok(None);
        }
        let before = trajectory.pois_before.len() as f64;
        let after = trajectory.pois_after.len() as f64;
        if after < before * self.min_gain_ratio {
            tracing::info!(task = task_id, before, after, ratio = self.min_gain_ratio, "POI gain below gate, no skill");
            return Ok(None);
        }
        let Some(delta) = TrajectoryDelta::between(trajectory) else {
            tracing::debug!(task = task_id, "no delta between first and last plan");
            return Ok(None);
        };
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let report = delta.render();
        let text = self
            .summarizer
            .summarize_delta(trajectory, &report)
            .await
            .map_err(|e| skipped(task_id, CapabilityError::failed("summarization", e)))?;
        let text = text.trim();
        if text.is_empty() {
            tracing::warn!(task = task_id, "summarizer returned no skill text");
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| skipped(task_id, CapabilityError::failed("embedding", e)))?;
        if embedding.is_empty() {
            return Err(skipped(
                task_id,
                CapabilityError::malformed("embedding", "empty vector"),
            ));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(skipped(
                task_id,
                CapabilityError::malformed("embedding", "non-finite value"),
            ));
        }

        Ok(Some(Skill::new(
            uuid::Uuid::new_v4().to_string(),
            text,
            embedding,
            task_id,
        )))
    }

    /// Distill and offer the result to `library`.
    ///
    /// A [`DistillationSkipped`] is logged and reported as `NoSkill`; library
    /// errors (store, dimension) propagate.
    pub async fn distill_into(
        &self,
        trajectory: &OptimizationTrajectory,
        library: &SkillLibrary,
    ) -> Result<SubmitOutcome, LibraryError> {
        let skill = match self.distill(trajectory).await {
            Ok(Some(skill)) => skill,
            Ok(None) => return Ok(SubmitOutcome::NoSkill),
            Err(skipped) => {
                tracing::warn!("{}", skipped);
                return Ok(SubmitOutcome::NoSkill);
            }
        };
        if library.add(skill.clone())? {
            Ok(SubmitOutcome::Accepted(skill))
        } else {
            Ok(SubmitOutcome::Rejected(skill))
        }
    }
}

fn skipped(task_id: &str, source: CapabilityError) -> DistillationSkipped {
    DistillationSkipped {
        task_id: task_id.to_string(),
        source,
    }
}
