use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use poiscout_core::capability::{Embedder, Summarizer};
use poiscout_core::config::LibraryConfig;
use poiscout_core::{OptimizationTrajectory, SearchPlan, SearchStep};
use poiscout_evolution::{Distiller, SkillLibrary, SubmitOutcome};
use poiscout_store::{DocumentStore, JsonDirStore, MemoryStore};

const VOCAB: [&str; 5] = ["indoor", "outdoor", "kids", "night", "food"];

/// Counts vocabulary words; anything else lands in the last dimension.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; VOCAB.len() + 1];
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            match VOCAB.iter().position(|w| *w == word) {
                Some(i) => v[i] += 1.0,
                None => v[VOCAB.len()] += 0.1,
            }
        }
        Ok(v)
    }
}

struct FixedSummarizer(&'static str);

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize_delta(&self, trajectory: &OptimizationTrajectory, delta_report: &str) -> Result<String> {
        assert!(delta_report.contains("POIs:"));
        assert!(!trajectory.task_id.is_empty());
        if self.0.is_empty() {
            bail!("summarization model unavailable");
        }
        Ok(self.0.to_string())
    }
}

fn trajectory(task_id: &str, before: usize, after: usize, iterations: u32) -> OptimizationTrajectory {
    let plan_before = SearchPlan::new(vec![SearchStep::new("museums", "museums")]);
    let mut plan_after = plan_before.clone();
    plan_after.steps[0].query_text = "indoor attractions for kids".into();
    plan_after.steps[0].revision_count = 1;
    OptimizationTrajectory {
        task_id: task_id.into(),
        request: "rainy day with kids".into(),
        plan_before,
        plan_after,
        pois_before: (0..before).map(|i| format!("p{}", i)).collect(),
        pois_after: (0..after).map(|i| format!("p{}", i)).collect(),
        reflection_notes: "museums too narrow".into(),
        iterations,
    }
}

fn distiller(text: &'static str) -> Distiller {
    Distiller::new(
        Arc::new(FixedSummarizer(text)),
        Arc::new(KeywordEmbedder),
        &LibraryConfig::default(),
    )
}

fn library(store: Arc<dyn DocumentStore>) -> SkillLibrary {
    SkillLibrary::open(Arc::new(KeywordEmbedder), store, LibraryConfig::default()).unwrap()
}

#[tokio::test]
async fn test_distill_produces_embedded_skill() {
    let skill = distiller("Prefer indoor venues for kids when weather is uncertain")
        .distill(&trajectory("task-1", 4, 8, 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(skill.source_task_id, "task-1");
    assert_eq!(skill.embedding.len(), VOCAB.len() + 1);
    assert!(skill.text.starts_with("Prefer indoor"));
}

#[tokio::test]
async fn test_short_or_low_gain_trajectories_yield_nothing() {
    let d = distiller("Prefer indoor venues");
    assert!(d.distill(&trajectory("t", 4, 8, 0)).await.unwrap().is_none());
    // 5 < 4 * 1.5
    assert!(d.distill(&trajectory("t", 4, 5, 2)).await.unwrap().is_none());
    assert!(d.distill(&trajectory("t", 4, 6, 2)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_summarizer_failure_is_skipped_not_fatal() {
    let d = distiller("");
    let err = d.distill(&trajectory("t-fail", 2, 6, 2)).await.unwrap_err();
    assert_eq!(err.task_id, "t-fail");
    assert_eq!(err.source.capability(), "summarization");

    let lib = library(Arc::new(MemoryStore::new()));
    let outcome = d.distill_into(&trajectory("t-fail", 2, 6, 2), &lib).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::NoSkill);
    assert!(lib.is_empty());
}

struct NanEmbedder;

#[async_trait]
impl Embedder for NanEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![f32::NAN, 1.0])
    }
}

#[tokio::test]
async fn test_non_finite_embedding_is_skipped_not_stored() {
    let d = Distiller::new(
        Arc::new(FixedSummarizer("Prefer indoor venues")),
        Arc::new(NanEmbedder),
        &LibraryConfig::default(),
    );
    let err = d.distill(&trajectory("t-nan", 2, 6, 2)).await.unwrap_err();
    assert_eq!(err.source.capability(), "embedding");

    let lib = library(Arc::new(MemoryStore::new()));
    let outcome = d.distill_into(&trajectory("t-nan", 2, 6, 2), &lib).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::NoSkill);
    assert!(lib.is_empty());
}

#[tokio::test]
async fn test_near_duplicate_skill_is_rejected() {
    let lib = library(Arc::new(MemoryStore::new()));
    let first = distiller("Prefer indoor venues for kids")
        .distill_into(&trajectory("a", 2, 6, 2), &lib)
        .await
        .unwrap();
    assert!(matches!(first, SubmitOutcome::Accepted(_)));

    let second = distiller("Kids prefer indoor venues")
        .distill_into(&trajectory("b", 2, 6, 2), &lib)
        .await
        .unwrap();
    assert!(matches!(second, SubmitOutcome::Rejected(ref s) if s.source_task_id == "b"));

    let third = distiller("Search night food markets")
        .distill_into(&trajectory("c", 2, 6, 2), &lib)
        .await
        .unwrap();
    assert!(matches!(third, SubmitOutcome::Accepted(_)));
    assert_eq!(lib.len(), 2);

    let hits = lib.retrieve("late night food", 1).await.unwrap();
    assert_eq!(hits[0].source_task_id, "c");
}

#[tokio::test]
async fn test_skills_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::open(dir.path()).unwrap());
    {
        let lib = library(store.clone());
        distiller("Prefer outdoor parks for kids")
            .distill_into(&trajectory("a", 2, 6, 2), &lib)
            .await
            .unwrap();
    }
    let reopened = library(Arc::new(JsonDirStore::open(dir.path()).unwrap()));
    let all = reopened.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].text, "Prefer outdoor parks for kids");
}
