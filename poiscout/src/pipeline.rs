//! End-to-end search for one request:
//! retrieve skills → plan → optimize → distill → build and save the tree.
//!
//! Capability failures degrade where a degraded result is still useful
//! (no skills, partial optimization, no new skill). Storage and integrity
//! errors always propagate.

use std::sync::Arc;

use poiscout_core::capability::{Embedder, Executor, Planner, QuestionGenerator, Reflector, Summarizer};
use poiscout_core::config::{OptimizerConfig, SelectorConfig};
use poiscout_core::{CancelFlag, CapabilityError, IntegrityViolation, PoiPool, SearchPlan, Skill};
use poiscout_evolution::{Distiller, LibraryError, SkillLibrary, SubmitOutcome};
use poiscout_search::{IterationRecord, OnlineOptimizer, RunStatus};
use poiscout_selector::{DecisionTree, SelectorError, TreeBuilder, TreeStore};
use thiserror::Error;

/// Every external capability one run needs.
#[derive(Clone)]
pub struct Capabilities {
    pub planner: Arc<dyn Planner>,
    pub executor: Arc<dyn Executor>,
    pub reflector: Arc<dyn Reflector>,
    pub summarizer: Arc<dyn Summarizer>,
    pub embedder: Arc<dyn Embedder>,
    pub questions: Arc<dyn QuestionGenerator>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Run the reflect-and-revise loop; otherwise execute the initial plan once.
    pub online_opt: bool,
    /// Condition the initial plan on retrieved skills.
    pub use_skills: bool,
    /// Distill the optimization trajectory into the skill library.
    pub create_skills: bool,
    pub build_tree: bool,
    pub optimizer: OptimizerConfig,
    pub selector: SelectorConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            online_opt: true,
            use_skills: true,
            create_skills: true,
            build_tree: true,
            optimizer: OptimizerConfig::default(),
            selector: SelectorConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not draft a search plan: {0}")]
    Plan(#[source] CapabilityError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

#[derive(Debug)]
pub struct SearchReport {
    pub task_id: String,
    pub request: String,
    /// Ids of the skills the initial plan was conditioned on.
    pub skills_used: Vec<String>,
    pub initial_plan: SearchPlan,
    pub final_plan: SearchPlan,
    pub pool: PoiPool,
    /// `None` when online optimization was off.
    pub status: Option<RunStatus>,
    pub iterations: Vec<IterationRecord>,
    pub integrity_violations: Vec<IntegrityViolation>,
    /// Why optimization stopped early, if it did.
    pub incomplete: Option<String>,
    pub skill: SubmitOutcome,
    pub tree: Option<DecisionTree>,
}

pub struct Pipeline {
    caps: Capabilities,
    library: Arc<SkillLibrary>,
    trees: TreeStore,
    options: PipelineOptions,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(
        caps: Capabilities,
        library: Arc<SkillLibrary>,
        trees: TreeStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            caps,
            library,
            trees,
            options,
            cancel: CancelFlag::new(),
        }
    }

    /// Observed between optimization iterations, before distillation and
    /// before tree building.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn library(&self) -> &SkillLibrary {
        &self.library
    }

    pub async fn run(&self, task_id: &str, request: &str) -> Result<SearchReport, PipelineError> {
        tracing::info!(task = task_id, request, "search started");
        let skills = self.retrieve_skills(request).await?;

        let initial_plan = self.draft_plan(request, &skills).await?;

        let optimizer = OnlineOptimizer::new(
            self.caps.planner.clone(),
            self.caps.executor.clone(),
            self.caps.reflector.clone(),
            self.options.optimizer.clone(),
        )
        .with_cancel(self.cancel.clone());

        let mut report = SearchReport {
            task_id: task_id.to_string(),
            request: request.to_string(),
            skills_used: skills.iter().map(|s| s.id.clone()).collect(),
            initial_plan: initial_plan.clone(),
            final_plan: initial_plan.clone(),
            pool: PoiPool::new(),
            status: None,
            iterations: Vec::new(),
            integrity_violations: Vec::new(),
            incomplete: None,
            skill: SubmitOutcome::NoSkill,
            tree: None,
        };

        if self.options.online_opt {
            let outcome = match optimizer.optimize(task_id, request, initial_plan).await {
                Ok(outcome) => outcome,
                Err(incomplete) => {
                    tracing::warn!("{}; continuing with the partial result", incomplete);
                    report.incomplete = Some(incomplete.to_string());
                    incomplete.into_partial()
                }
            };

            if self.options.create_skills {
                let distiller = Distiller::new(
                    self.caps.summarizer.clone(),
                    self.caps.embedder.clone(),
                    self.library.config(),
                )
                .with_cancel(self.cancel.clone());
                report.skill = distiller.distill_into(&outcome.trajectory, &self.library).await?;
            }

            report.final_plan = outcome.final_plan;
            report.pool = outcome.pool;
            report.status = Some(outcome.status);
            report.iterations = outcome.iterations;
            report.integrity_violations = outcome.integrity_violations;
        } else {
            let (pool, violations) = optimizer.execute_once(&report.initial_plan).await;
            report.pool = pool;
            report.integrity_violations = violations;
        }

        if self.options.build_tree && !self.cancel.is_cancelled() {
            let builder = TreeBuilder::new(self.caps.questions.clone(), self.options.selector.clone());
            let tree = builder.build(task_id, request, &report.pool).await;
            self.trees.save(&tree)?;
            report.tree = Some(tree);
        }

        tracing::info!(
            task = task_id,
            pois = report.pool.len(),
            skill = skill_label(&report.skill),
            "search finished"
        );
        Ok(report)
    }

    /// Plan generation gets the optimizer's retry budget; each retry is told
    /// its attempt number so the planner can sample differently.
    async fn draft_plan(&self, request: &str, skills: &[Skill]) -> Result<SearchPlan, PipelineError> {
        let retries = self.options.optimizer.retries as usize;
        let mut attempt = 0usize;
        loop {
            match self.caps.planner.generate_plan(request, skills, attempt).await {
                Ok(plan) => return Ok(plan),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    tracing::warn!(attempt, retries, "plan generation failed, retrying: {:#}", e);
                }
                Err(e) => return Err(PipelineError::Plan(CapabilityError::failed("planner", e))),
            }
        }
    }

    /// A failed request embedding means planning without skills; a store or
    /// integrity problem in the library does not.
    async fn retrieve_skills(&self, request: &str) -> Result<Vec<Skill>, PipelineError> {
        if !self.options.use_skills {
            return Ok(Vec::new());
        }
        let k = self.library.config().retrieve_k;
        match self.library.retrieve(request, k).await {
            Ok(skills) => {
                tracing::debug!(retrieved = skills.len(), library = self.library.len(), "skills retrieved");
                Ok(skills)
            }
            Err(LibraryError::Capability(e)) => {
                tracing::warn!("skill retrieval failed, planning without skills: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub fn skill_label(outcome: &SubmitOutcome) -> &'static str {
    match outcome {
        SubmitOutcome::NoSkill => "none",
        SubmitOutcome::Accepted(_) => "accepted",
        SubmitOutcome::Rejected(_) => "rejected",
    }
}

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
