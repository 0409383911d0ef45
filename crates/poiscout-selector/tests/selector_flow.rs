use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use poiscout_core::capability::{QaRecord, QuestionCandidate, QuestionGenerator};
use poiscout_core::config::SelectorConfig;
use poiscout_core::{Poi, PoiPool};
use poiscout_selector::{Advance, Answer, Node, SelectorError, TreeBuilder, TreeStore};
use poiscout_store::{DocumentStore, MemoryStore, SqliteStore, TREES_NS};

/// Splits the subset in half by position; question text encodes depth.
struct HalvingGenerator {
    histories: Mutex<Vec<Vec<QaRecord>>>,
}

impl HalvingGenerator {
    fn new() -> Self {
        Self {
            histories: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QuestionGenerator for HalvingGenerator {
    async fn generate_question(
        &self,
        _request: &str,
        subset: &[Poi],
        history: &[QaRecord],
        _attempt: usize,
    ) -> Result<QuestionCandidate> {
        self.histories.lock().unwrap().push(history.to_vec());
        let mid = subset.len() / 2;
        Ok(QuestionCandidate {
            question: format!("Q{} on {}", history.len(), subset[0].id),
            option_a: "first half".into(),
            option_b: "second half".into(),
            branch_a: subset[..mid].iter().map(|p| p.id.clone()).collect(),
            branch_b: subset[mid..].iter().map(|p| p.id.clone()).collect(),
        })
    }
}

struct FailingGenerator;

#[async_trait]
impl QuestionGenerator for FailingGenerator {
    async fn generate_question(
        &self,
        _request: &str,
        _subset: &[Poi],
        _history: &[QaRecord],
        _attempt: usize,
    ) -> Result<QuestionCandidate> {
        bail!("question model timed out")
    }
}

/// Attempt 0 is lopsided, attempts 1 and 2 are equally balanced.
struct RankedGenerator;

#[async_trait]
impl QuestionGenerator for RankedGenerator {
    async fn generate_question(
        &self,
        _request: &str,
        subset: &[Poi],
        _history: &[QaRecord],
        attempt: usize,
    ) -> Result<QuestionCandidate> {
        let ids: Vec<String> = subset.iter().map(|p| p.id.clone()).collect();
        let cut = if attempt == 0 { ids.len() - 1 } else { ids.len() / 2 };
        Ok(QuestionCandidate {
            question: format!("attempt {}", attempt),
            option_a: "yes".into(),
            option_b: "no".into(),
            branch_a: ids[..cut].to_vec(),
            branch_b: ids[cut..].to_vec(),
        })
    }
}

fn pool(n: usize) -> PoiPool {
    PoiPool::from_pois((0..n).map(|i| {
        Poi::new(format!("poi-{}", i), format!("Place {}", i), "kids")
            .with_attribute("indoor", if i % 2 == 0 { "yes" } else { "no" })
    }))
    .unwrap()
}

fn config(leaf_threshold: usize, max_depth: usize) -> SelectorConfig {
    SelectorConfig {
        leaf_threshold,
        max_depth,
        question_candidates: 3,
    }
}

#[tokio::test]
async fn test_empty_pool_builds_single_empty_leaf() {
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let tree = builder.build("empty", "anything", &PoiPool::new()).await;

    assert_eq!(tree.nodes.len(), 1);
    assert!(matches!(tree.root_node(), Some(Node::Leaf { .. })));
    assert!(tree.subset_pois(tree.root_node().unwrap().subset()).is_empty());

    match tree.resume(&[]).unwrap() {
        Advance::Final { pois, .. } => assert!(pois.is_empty()),
        other => panic!("expected final, got {:?}", other),
    }
    let err = tree.advance(tree.start(), Answer::A).unwrap_err();
    assert!(matches!(err, SelectorError::InvalidSessionState { .. }));
}

#[tokio::test]
async fn test_eight_pois_threshold_two_has_depth_at_least_two() {
    let generator = Arc::new(HalvingGenerator::new());
    let builder = TreeBuilder::new(generator.clone(), config(2, 5));
    let tree = builder.build("t8", "aquarium for kids", &pool(8)).await;

    assert!(tree.depth() >= 2);
    assert_eq!(tree.leaf_count(), 4);
    let mut reached: Vec<String> = Vec::new();
    for node in &tree.nodes {
        if let Node::Leaf { subset, .. } = node {
            assert!(tree.subsets[*subset].len() <= 2);
            reached.extend(tree.subsets[*subset].iter().cloned());
        }
    }
    reached.sort();
    assert_eq!(reached.len(), 8);

    // Children are built with the path of answers that leads to them.
    let histories = generator.histories.lock().unwrap();
    assert!(histories.iter().any(|h| h.len() == 1 && h[0].chosen_option == "second half"));
}

#[tokio::test]
async fn test_traversal_is_deterministic_and_back_undoes() {
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let tree = builder.build("t", "r", &pool(8)).await;

    let session = tree.start();
    assert_eq!(tree.current_pois(&session).unwrap().len(), 8);
    let (question, _, _) = tree.current_question(&session).unwrap();
    assert_eq!(question, "Q0 on poi-0");

    let session = match tree.advance(session, Answer::B).unwrap() {
        Advance::Continue(s) => s,
        other => panic!("expected a second question, got {:?}", other),
    };
    let after_one = session.current_node();
    let final_pois = match tree.advance(session.clone(), Answer::A).unwrap() {
        Advance::Final { pois, session } => {
            assert_eq!(session.history().len(), 2);
            assert_eq!(session.history()[0].chosen_option, "second half");
            pois
        }
        other => panic!("expected leaf, got {:?}", other),
    };
    let ids: Vec<&str> = final_pois.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["poi-4", "poi-5"]);

    for _ in 0..3 {
        let replay = tree.resume(&[Answer::B, Answer::A]).unwrap();
        assert_eq!(replay.session().current_node(), tree.advance(session.clone(), Answer::A).unwrap().session().current_node());
    }

    let leaf_session = tree.resume(&[Answer::B, Answer::A]).unwrap().session().clone();
    let back = tree.back(leaf_session).unwrap();
    assert_eq!(back.current_node(), after_one);
    assert_eq!(back.answers(), vec![Answer::B]);

    let err = tree.resume(&[Answer::B, Answer::A, Answer::A]).unwrap_err();
    assert!(matches!(err, SelectorError::InvalidSessionState { .. }));
}

#[tokio::test]
async fn test_rebuilt_trees_are_interchangeable() {
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let first = builder.build("task-1", "r", &pool(8)).await;
    let second = builder.build("task-2", "r", &pool(8)).await;
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.subsets, second.subsets);

    let session = first.resume(&[Answer::A]).unwrap().session().clone();
    let on_second = second.advance(session.clone(), Answer::B).unwrap();
    let on_first = first.advance(session.clone(), Answer::B).unwrap();
    assert_eq!(on_second.session().task_id, "task-2");
    assert_eq!(on_first.session().current_node(), on_second.session().current_node());
    assert_eq!(on_first.session().history(), on_second.session().history());
    assert_eq!(
        first.current_pois(on_first.session()).unwrap(),
        second.current_pois(on_second.session()).unwrap()
    );

    // back and current_pois accept the other tree's session too.
    assert_eq!(second.current_pois(&session).unwrap(), first.current_pois(&session).unwrap());
    assert_eq!(second.back(session).unwrap().current_node(), second.root);
}

#[tokio::test]
async fn test_round_trip_gives_identical_advance_outcomes() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let trees = TreeStore::new(store);
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let tree = builder.build("task-rt", "museums", &pool(6)).await;

    trees.save(&tree).unwrap();
    let loaded = trees.load("task-rt").unwrap().unwrap();
    assert_eq!(loaded, tree);
    assert!(trees.load("missing").unwrap().is_none());

    for answers in [vec![Answer::A, Answer::A], vec![Answer::B, Answer::B], vec![Answer::A]] {
        assert_eq!(tree.resume(&answers).unwrap(), loaded.resume(&answers).unwrap());
    }
}

#[tokio::test]
async fn test_malformed_stored_tree_is_surfaced() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let tree = builder.build("bad", "r", &pool(4)).await;
    let mut doc = serde_json::to_value(&tree).unwrap();
    doc["root"] = serde_json::json!(99);
    store.put(TREES_NS, "bad", &doc).unwrap();
    store.put(TREES_NS, "junk", &serde_json::json!({"nodes": "nope"})).unwrap();

    let trees = TreeStore::new(store);
    assert!(matches!(trees.load("bad"), Err(SelectorError::Integrity(_))));
    assert!(matches!(trees.load("junk"), Err(SelectorError::Integrity(_))));
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let trees = TreeStore::new(Arc::new(MemoryStore::new()));
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let mut older = builder.build("a-older", "first trip", &pool(3)).await;
    older.created_at = Utc::now() - Duration::hours(2);
    let newer = builder.build("b-newer", "second trip", &pool(5)).await;
    trees.save(&older).unwrap();
    trees.save(&newer).unwrap();

    let listed = trees.list().unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.task_id.as_str()).collect();
    assert_eq!(ids, vec!["b-newer", "a-older"]);
    assert_eq!(listed[0].poi_count, 5);
    assert_eq!(listed[1].request, "first trip");
}

#[tokio::test]
async fn test_first_best_candidate_wins_ties() {
    let builder = TreeBuilder::new(Arc::new(RankedGenerator), config(2, 1));
    let tree = builder.build("tie", "r", &pool(8)).await;
    match tree.root_node().unwrap() {
        Node::Decision { question, .. } => assert_eq!(question, "attempt 1"),
        other => panic!("expected decision, got {:?}", other),
    }
    // max_depth 1 stops below the root regardless of subset size.
    assert_eq!(tree.depth(), 1);
    assert_eq!(tree.leaf_count(), 2);
}

#[tokio::test]
async fn test_question_failures_degrade_to_leaf() {
    let builder = TreeBuilder::new(Arc::new(FailingGenerator), config(2, 5));
    let tree = builder.build("fail", "r", &pool(8)).await;
    assert_eq!(tree.nodes.len(), 1);
    assert_eq!(tree.current_pois(&tree.start()).unwrap().len(), 8);
}

#[tokio::test]
async fn test_session_that_does_not_fit_is_rejected() {
    let builder = TreeBuilder::new(Arc::new(HalvingGenerator::new()), config(2, 5));
    let big = builder.build("big", "r", &pool(8)).await;
    let small = builder.build("small", "r", &pool(2)).await;
    assert_eq!(small.nodes.len(), 1);

    let session = big.resume(&[Answer::A]).unwrap().session().clone();
    assert!(matches!(
        small.advance(session.clone(), Answer::A),
        Err(SelectorError::InvalidSessionState { .. })
    ));
    assert!(matches!(
        small.current_pois(&session),
        Err(SelectorError::InvalidSessionState { .. })
    ));
    // A fresh session from another task still binds to the root.
    assert_eq!(small.current_pois(&big.start()).unwrap().len(), 2);
}
