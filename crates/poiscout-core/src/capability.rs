//! External capability interfaces.
//!
//! Implementations live outside the engine (LLM-backed adapters in
//! `poiscout-agent`, scripted doubles in tests). Every call here is a
//! suspension point; everything else in the engine is synchronous.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::plan::{SearchPlan, SearchStep, StepVerdict};
use crate::poi::Poi;
use crate::skill::Skill;
use crate::trajectory::OptimizationTrajectory;

/// Plan generation and per-topic query generation.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Draft the initial multi-topic plan, optionally guided by retrieved skills.
    /// `attempt` counts earlier failed attempts for this request.
    async fn generate_plan(
        &self,
        request: &str,
        skills: &[Skill],
        attempt: usize,
    ) -> Result<SearchPlan>;

    /// Produce a query for `topic`. With `diversify`, the query must be
    /// structurally different from typical phrasings and is not conditioned
    /// on any previous query.
    async fn generate_query(&self, topic: &str, diversify: bool) -> Result<String>;
}

/// What one executed step yielded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub pois: Vec<Poi>,
    pub recall: u32,
    /// Bounded quality signal; higher is better.
    pub quality: f64,
}

impl StepExecution {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Runs one search step (queries, fetches, extraction) and scores it.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, step: &SearchStep) -> Result<StepExecution>;
}

/// Reflection output for a whole plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// Steps without an entry are kept as-is.
    pub verdicts: Vec<StepVerdict>,
    #[serde(default)]
    pub notes: String,
}

/// Judges a measured plan and proposes per-step verdicts.
#[async_trait]
pub trait Reflector: Send + Sync {
    /// `attempt` counts earlier failed attempts on this same plan.
    async fn reflect(&self, request: &str, plan: &SearchPlan, attempt: usize) -> Result<Reflection>;
}

/// Turns a characterized trajectory delta into candidate skill text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_delta(
        &self,
        trajectory: &OptimizationTrajectory,
        delta_report: &str,
    ) -> Result<String>;
}

/// Fixed-length text embedding, shared by skills, requests and questions.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// One answered question on the path to a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub chosen_option: String,
}

/// A generated A/B question with the partition it implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCandidate {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    /// POI ids that fit option A.
    pub branch_a: Vec<String>,
    /// POI ids that fit option B.
    pub branch_b: Vec<String>,
}

/// Generates discriminative questions over a POI subset.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// `attempt` counts candidates already requested for this node so the
    /// implementation can vary its output.
    async fn generate_question(
        &self,
        request: &str,
        subset: &[Poi],
        history: &[QaRecord],
        attempt: usize,
    ) -> Result<QuestionCandidate>;
}
