use std::sync::Arc;

use anyhow::{Context, Result};
use poiscout_agent::LlmCapabilities;
use poiscout_core::config::{
    EmbeddingConfig, LibraryConfig, LlmConfig, OptimizerConfig, PathsConfig, SelectorConfig,
};
use poiscout_core::{CancelFlag, Poi};
use poiscout_evolution::{SkillLibrary, SubmitOutcome};
use poiscout_selector::TreeStore;
use serde::Serialize;

use crate::pipeline::{new_task_id, skill_label, Capabilities, Pipeline, PipelineOptions, SearchReport};

pub struct SearchArgs {
    pub request: String,
    pub online_opt: bool,
    pub opt_iterations: Option<u32>,
    pub use_skill: bool,
    pub create_skill: bool,
    pub build_tree: bool,
    pub task_id: Option<String>,
    pub json: bool,
}

pub async fn run(paths: &PathsConfig, args: SearchArgs) -> Result<()> {
    let llm = LlmCapabilities::new(&LlmConfig::from_env(), &EmbeddingConfig::from_env())
        .context("LLM is not configured")?;
    let store = super::open_documents(paths)?;
    let library = SkillLibrary::open(llm.embedder.clone(), store.clone(), LibraryConfig::from_env())
        .context("Failed to load skill library")?;

    let mut optimizer = OptimizerConfig::from_env();
    if let Some(n) = args.opt_iterations {
        optimizer.max_iterations = n;
    }
    let options = PipelineOptions {
        online_opt: args.online_opt,
        use_skills: args.use_skill,
        create_skills: args.create_skill,
        build_tree: args.build_tree,
        optimizer,
        selector: SelectorConfig::from_env(),
    };
    let caps = Capabilities {
        planner: llm.planner.clone(),
        executor: llm.executor_for(&args.request),
        reflector: llm.reflector.clone(),
        summarizer: llm.summarizer.clone(),
        embedder: llm.embedder.clone(),
        questions: llm.questions.clone(),
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping at the next iteration boundary");
            on_interrupt.cancel();
        }
    });

    let pipeline = Pipeline::new(caps, Arc::new(library), TreeStore::new(store), options).with_cancel(cancel);
    let task_id = args.task_id.unwrap_or_else(new_task_id);
    let report = pipeline.run(&task_id, &args.request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ReportView::from(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}

#[derive(Serialize)]
struct ReportView<'a> {
    task_id: &'a str,
    request: &'a str,
    status: Option<&'static str>,
    incomplete: Option<&'a str>,
    iterations: usize,
    skills_used: &'a [String],
    skill: &'static str,
    skill_text: Option<&'a str>,
    integrity_violations: Vec<String>,
    tree_nodes: Option<usize>,
    tree_depth: Option<usize>,
    pois: Vec<&'a Poi>,
}

impl<'a> From<&'a SearchReport> for ReportView<'a> {
    fn from(report: &'a SearchReport) -> Self {
        let skill_text = match &report.skill {
            SubmitOutcome::Accepted(s) | SubmitOutcome::Rejected(s) => Some(s.text.as_str()),
            SubmitOutcome::NoSkill => None,
        };
        Self {
            task_id: &report.task_id,
            request: &report.request,
            status: report.status.map(|s| s.as_str()),
            incomplete: report.incomplete.as_deref(),
            iterations: report.iterations.len(),
            skills_used: &report.skills_used,
            skill: skill_label(&report.skill),
            skill_text,
            integrity_violations: report.integrity_violations.iter().map(|v| v.to_string()).collect(),
            tree_nodes: report.tree.as_ref().map(|t| t.nodes.len()),
            tree_depth: report.tree.as_ref().map(|t| t.depth()),
            pois: report.pool.iter().collect(),
        }
    }
}

fn print_report(report: &SearchReport) {
    println!("Task: {}", report.task_id);
    if !report.skills_used.is_empty() {
        println!("Skills used: {}", report.skills_used.len());
    }
    match report.status {
        Some(status) => println!(
            "Optimization: {} after {} iteration(s)",
            status.as_str(),
            report.iterations.len()
        ),
        None => println!("Optimization: off"),
    }
    if let Some(reason) = &report.incomplete {
        println!("  stopped early: {}", reason);
    }
    for iteration in &report.iterations {
        println!(
            "  #{} mean quality {:.2}, pool {} (+{})",
            iteration.iteration, iteration.mean_quality, iteration.pool_size, iteration.new_pois
        );
    }
    println!("Final plan:");
    for step in &report.final_plan.steps {
        println!("  - {}: {}", step.topic, step.query_text);
    }
    match &report.skill {
        SubmitOutcome::Accepted(skill) => println!("New skill: {}", skill.text),
        SubmitOutcome::Rejected(_) => println!("Distilled skill too close to an existing one; not stored"),
        SubmitOutcome::NoSkill => {}
    }
    for violation in &report.integrity_violations {
        println!("Warning: {}", violation);
    }
    println!("Places found: {}", report.pool.len());
    for poi in report.pool.iter() {
        println!("  - {}", poi.describe());
    }
    if let Some(tree) = &report.tree {
        println!(
            "Decision tree saved: {} nodes, depth {} (poiscout select {} --answers ...)",
            tree.nodes.len(),
            tree.depth(),
            report.task_id
        );
    }
}
