use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use poiscout::pipeline::new_task_id;
use poiscout::{Capabilities, Pipeline, PipelineError, PipelineOptions};
use poiscout_core::capability::{
    Embedder, Executor, Planner, QaRecord, QuestionCandidate, QuestionGenerator, Reflection, Reflector,
    StepExecution, Summarizer,
};
use poiscout_core::config::{LibraryConfig, OptimizerConfig, SelectorConfig};
use poiscout_core::{
    OptimizationTrajectory, Poi, SearchPlan, SearchStep, Skill, StepVerdict, Verdict,
};
use poiscout_evolution::{SkillLibrary, SubmitOutcome};
use poiscout_search::RunStatus;
use poiscout_selector::{Advance, Answer, TreeStore};
use poiscout_store::{DocumentStore, JsonDirStore, MemoryStore};

/// Two-topic plan; records how many skills each plan was conditioned on.
/// The first `failures` calls fail.
#[derive(Default)]
struct TwoTopicPlanner {
    skills_seen: Mutex<Vec<usize>>,
    attempts: Mutex<Vec<usize>>,
    failures: AtomicUsize,
}

impl TwoTopicPlanner {
    fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Planner for TwoTopicPlanner {
    async fn generate_plan(&self, _request: &str, skills: &[Skill], attempt: usize) -> Result<SearchPlan> {
        self.attempts.lock().unwrap().push(attempt);
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            bail!("planner model unavailable");
        }
        self.skills_seen.lock().unwrap().push(skills.len());
        Ok(SearchPlan::new(vec![
            SearchStep::new("aquariums", "aquarium"),
            SearchStep::new("museums", "museum"),
        ]))
    }

    async fn generate_query(&self, topic: &str, _diversify: bool) -> Result<String> {
        Ok(format!("{} elsewhere", topic))
    }
}

/// One new POI per call per topic, so the pool grows every iteration.
#[derive(Default)]
struct GrowingExecutor {
    calls: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl Executor for GrowingExecutor {
    async fn execute(&self, step: &SearchStep) -> Result<StepExecution> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let c = calls.entry(step.topic.clone()).or_insert(0);
            *c += 1;
            *c
        };
        let pois = vec![Poi::new(format!("{}-{}", step.topic, n), format!("{} #{}", step.topic, n), &step.topic)
            .with_attribute("indoor", if n % 2 == 0 { "yes" } else { "no" })];
        Ok(StepExecution {
            recall: 1,
            pois,
            quality: 0.2 * n as f64,
        })
    }
}

struct RevisingReflector {
    calls: AtomicUsize,
    fail: bool,
}

impl RevisingReflector {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }
}

#[async_trait]
impl Reflector for RevisingReflector {
    async fn reflect(&self, _request: &str, plan: &SearchPlan, _attempt: usize) -> Result<Reflection> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail && call == 2 {
            bail!("reflection model returned 503");
        }
        Ok(Reflection {
            verdicts: plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| StepVerdict {
                    step: i,
                    verdict: Verdict::Revise {
                        query_text: format!("{} for families {}", s.topic, call),
                    },
                })
                .collect(),
            notes: "queries too generic".into(),
        })
    }
}

struct FixedSummarizer;

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize_delta(&self, _trajectory: &OptimizationTrajectory, _delta_report: &str) -> Result<String> {
        Ok("Add the audience to every query.".into())
    }
}

/// Every text embeds to the same direction.
struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

struct IndoorQuestion;

#[async_trait]
impl QuestionGenerator for IndoorQuestion {
    async fn generate_question(
        &self,
        _request: &str,
        subset: &[Poi],
        history: &[QaRecord],
        _attempt: usize,
    ) -> Result<QuestionCandidate> {
        let (a, b): (Vec<&Poi>, Vec<&Poi>) = subset
            .iter()
            .partition(|p| p.attributes.get("indoor").map(String::as_str) == Some("yes"));
        Ok(QuestionCandidate {
            question: format!("Indoor? (round {})", history.len() + 1),
            option_a: "Indoor".into(),
            option_b: "Outdoor".into(),
            branch_a: a.iter().map(|p| p.id.clone()).collect(),
            branch_b: b.iter().map(|p| p.id.clone()).collect(),
        })
    }
}

fn caps(planner: Arc<TwoTopicPlanner>, reflector: RevisingReflector) -> Capabilities {
    Capabilities {
        planner,
        executor: Arc::new(GrowingExecutor::default()),
        reflector: Arc::new(reflector),
        summarizer: Arc::new(FixedSummarizer),
        embedder: Arc::new(ConstantEmbedder),
        questions: Arc::new(IndoorQuestion),
    }
}

fn options() -> PipelineOptions {
    PipelineOptions {
        online_opt: true,
        use_skills: true,
        create_skills: true,
        build_tree: true,
        optimizer: OptimizerConfig {
            max_iterations: 3,
            regularization_threshold: 3,
            convergence_epsilon: 0.0,
            concurrency: 2,
            step_timeout_secs: 5,
            retries: 0,
        },
        selector: SelectorConfig::default(),
    }
}

fn library(store: Arc<dyn DocumentStore>) -> Arc<SkillLibrary> {
    Arc::new(SkillLibrary::open(Arc::new(ConstantEmbedder), store, LibraryConfig::default()).unwrap())
}

#[tokio::test]
async fn test_full_run_learns_a_skill_and_reuses_it() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let planner = Arc::new(TwoTopicPlanner::default());
    let pipeline = Pipeline::new(
        caps(planner.clone(), RevisingReflector::new(false)),
        library(store.clone()),
        TreeStore::new(store.clone()),
        options(),
    );

    let first = pipeline.run("task-1", "rainy day with kids").await.unwrap();
    assert_eq!(first.status, Some(RunStatus::Exhausted));
    assert_eq!(first.iterations.len(), 3);
    assert_eq!(first.pool.len(), 6);
    assert!(first.skills_used.is_empty());
    assert!(first.incomplete.is_none());
    let SubmitOutcome::Accepted(skill) = &first.skill else {
        panic!("expected a new skill, got {:?}", first.skill);
    };
    assert_eq!(skill.source_task_id, "task-1");
    assert_eq!(first.final_plan.steps[0].query_text, "aquariums for families 3");

    // The tree was saved under the task id and can be walked.
    let trees = TreeStore::new(store.clone());
    let tree = trees.load("task-1").unwrap().unwrap();
    assert_eq!(tree.pool.len(), 6);
    let Advance::Final { pois, .. } = tree.resume(&[Answer::A]).unwrap() else {
        panic!("two indoor places should already be a leaf");
    };
    assert_eq!(pois.len(), 2);
    assert!(pois.iter().all(|p| p.attributes["indoor"] == "yes"));

    // A second run retrieves the stored skill; the identical new skill is rejected.
    let second = pipeline.run("task-2", "rainy day with kids").await.unwrap();
    assert_eq!(second.skills_used, vec![skill.id.clone()]);
    assert_eq!(*planner.skills_seen.lock().unwrap(), vec![0, 1]);
    assert!(matches!(second.skill, SubmitOutcome::Rejected(_)));
    assert_eq!(pipeline.library().len(), 1);
    assert_eq!(trees.list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reflection_failure_keeps_partial_result() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(
        caps(Arc::new(TwoTopicPlanner::default()), RevisingReflector::new(true)),
        library(store.clone()),
        TreeStore::new(store.clone()),
        options(),
    );
    let report = pipeline.run("partial", "museums").await.unwrap();
    assert_eq!(report.status, Some(RunStatus::Incomplete));
    assert!(report.incomplete.as_deref().unwrap().contains("reflection"));
    assert_eq!(report.iterations.len(), 1);
    assert_eq!(report.pool.len(), 4);
    assert!(report.tree.is_some());
}

#[tokio::test]
async fn test_without_online_opt_executes_once_and_learns_nothing() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let mut opts = options();
    opts.online_opt = false;
    opts.build_tree = false;
    let pipeline = Pipeline::new(
        caps(Arc::new(TwoTopicPlanner::default()), RevisingReflector::new(false)),
        library(store.clone()),
        TreeStore::new(store.clone()),
        opts,
    );
    let report = pipeline.run(&new_task_id(), "museums").await.unwrap();
    assert!(report.status.is_none());
    assert_eq!(report.pool.len(), 2);
    assert_eq!(report.final_plan, report.initial_plan);
    assert!(matches!(report.skill, SubmitOutcome::NoSkill));
    assert!(report.tree.is_none());
    assert!(TreeStore::new(store).list().unwrap().is_empty());
}

#[tokio::test]
async fn test_planner_failure_is_an_error() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let planner = Arc::new(TwoTopicPlanner::failing(1));
    let pipeline = Pipeline::new(
        caps(planner, RevisingReflector::new(false)),
        library(store.clone()),
        TreeStore::new(store),
        options(),
    );
    let err = pipeline.run("t", "r").await.unwrap_err();
    assert!(matches!(err, PipelineError::Plan(_)));
}

#[tokio::test]
async fn test_planner_is_retried_before_giving_up() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let mut opts = options();
    opts.optimizer.retries = 1;
    let planner = Arc::new(TwoTopicPlanner::failing(1));
    let pipeline = Pipeline::new(
        caps(planner.clone(), RevisingReflector::new(false)),
        library(store.clone()),
        TreeStore::new(store),
        opts,
    );
    let report = pipeline.run("t", "rainy day").await.unwrap();
    assert_eq!(report.initial_plan.steps.len(), 2);
    assert_eq!(*planner.attempts.lock().unwrap(), vec![0, 1]);

    let planner = Arc::new(TwoTopicPlanner::failing(2));
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let mut opts = options();
    opts.optimizer.retries = 1;
    let pipeline = Pipeline::new(
        caps(planner.clone(), RevisingReflector::new(false)),
        library(store.clone()),
        TreeStore::new(store),
        opts,
    );
    assert!(matches!(pipeline.run("t", "r").await.unwrap_err(), PipelineError::Plan(_)));
    assert_eq!(*planner.attempts.lock().unwrap(), vec![0, 1]);
}

#[tokio::test]
async fn test_skills_and_trees_survive_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::open(dir.path()).unwrap());
        let pipeline = Pipeline::new(
            caps(Arc::new(TwoTopicPlanner::default()), RevisingReflector::new(false)),
            library(store.clone()),
            TreeStore::new(store),
            options(),
        );
        pipeline.run("disk", "aquarium day").await.unwrap();
    }
    let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::open(dir.path()).unwrap());
    assert_eq!(library(store.clone()).len(), 1);
    let summaries = TreeStore::new(store).list().unwrap();
    assert_eq!(summaries[0].task_id, "disk");
    assert_eq!(summaries[0].poi_count, 6);
}
