//! Tree construction: breadth-first, one question per internal node.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use poiscout_core::capability::{QaRecord, QuestionCandidate, QuestionGenerator};
use poiscout_core::config::SelectorConfig;
use poiscout_core::{Poi, PoiPool};

use crate::tree::{DecisionTree, Node, NodeId, SubsetId};

/// Expected information gain of splitting `n` POIs into children of size
/// `a` and `b` (which may overlap), scaled by the share of the subset the
/// question actually classified.
///
/// `coverage × (log2 n − (w_a·log2 a + w_b·log2 b))`; zero when either
/// branch is empty.
pub fn score_partition(n: usize, a: usize, b: usize, covered: usize) -> f64 {
    if n == 0 || a == 0 || b == 0 {
        return 0.0;
    }
    let total = (a + b) as f64;
    let (af, bf) = (a as f64, b as f64);
    let expected_remaining = (af / total) * af.log2() + (bf / total) * bf.log2();
    let coverage = covered.min(n) as f64 / n as f64;
    (coverage * ((n as f64).log2() - expected_remaining)).max(0.0)
}

struct Pending {
    node: NodeId,
    subset: Vec<String>,
    depth: usize,
    history: Vec<QaRecord>,
}

/// A candidate after its branches were checked against the node's subset.
struct Split {
    candidate: QuestionCandidate,
    subset_a: Vec<String>,
    subset_b: Vec<String>,
    score: f64,
}

pub struct TreeBuilder {
    generator: Arc<dyn QuestionGenerator>,
    config: SelectorConfig,
}

impl TreeBuilder {
    pub fn new(generator: Arc<dyn QuestionGenerator>, config: SelectorConfig) -> Self {
        Self { generator, config }
    }

    /// Build a tree for `pool`. An empty pool gives a single empty leaf.
    ///
    /// Question generation failures degrade the node to a leaf; building
    /// never fails.
    pub async fn build(&self, task_id: &str, request: &str, pool: &PoiPool) -> DecisionTree {
        let pois: Vec<Poi> = pool.iter().cloned().collect();
        let mut tree = DecisionTree {
            task_id: task_id.to_string(),
            request: request.to_string(),
            created_at: Utc::now(),
            leaf_threshold: self.config.leaf_threshold,
            max_depth: self.config.max_depth,
            pool: pois,
            subsets: Vec::new(),
            nodes: Vec::new(),
            root: 0,
        };

        let mut queue = VecDeque::new();
        tree.nodes.push(Node::Leaf { subset: 0, depth: 0 });
        queue.push_back(Pending {
            node: 0,
            subset: tree.pool.iter().map(|p| p.id.clone()).collect(),
            depth: 0,
            history: Vec::new(),
        });

        while let Some(pending) = queue.pop_front() {
            let subset_id = push_subset(&mut tree, pending.subset.clone());
            let stop = pending.subset.len() <= self.config.leaf_threshold
                || pending.depth >= self.config.max_depth;
            let split = if stop {
                None
            } else {
                self.best_split(&tree, request, &pending).await
            };

            let Some(split) = split else {
                tree.nodes[pending.node] = Node::Leaf {
                    subset: subset_id,
                    depth: pending.depth,
                };
                continue;
            };

            tracing::debug!(
                depth = pending.depth,
                n = pending.subset.len(),
                a = split.subset_a.len(),
                b = split.subset_b.len(),
                score = split.score,
                question = %split.candidate.question,
                "split"
            );
            let branch_a = tree.nodes.len();
            let branch_b = branch_a + 1;
            tree.nodes.push(Node::Leaf { subset: 0, depth: pending.depth + 1 });
            tree.nodes.push(Node::Leaf { subset: 0, depth: pending.depth + 1 });

            for (node, subset, option) in [
                (branch_a, split.subset_a, &split.candidate.option_a),
                (branch_b, split.subset_b, &split.candidate.option_b),
            ] {
                let mut history = pending.history.clone();
                history.push(QaRecord {
                    question: split.candidate.question.clone(),
                    chosen_option: option.clone(),
                });
                queue.push_back(Pending {
                    node,
                    subset,
                    depth: pending.depth + 1,
                    history,
                });
            }

            let QuestionCandidate {
                question,
                option_a,
                option_b,
                ..
            } = split.candidate;
            tree.nodes[pending.node] = Node::Decision {
                question,
                option_a,
                option_b,
                branch_a,
                branch_b,
                subset: subset_id,
                depth: pending.depth,
            };
        }

        tracing::info!(
            task = task_id,
            pois = tree.pool.len(),
            nodes = tree.nodes.len(),
            depth = tree.depth(),
            "decision tree built"
        );
        tree
    }

    /// Generate the configured number of candidates and keep the best.
    /// Earlier candidates win ties. `None` when nothing scores above zero.
    async fn best_split(&self, tree: &DecisionTree, request: &str, pending: &Pending) -> Option<Split> {
        let wanted: HashSet<&str> = pending.subset.iter().map(String::as_str).collect();
        let subset_pois: Vec<Poi> = tree
            .pool
            .iter()
            .filter(|p| wanted.contains(p.id.as_str()))
            .cloned()
            .collect();

        let mut best: Option<Split> = None;
        for attempt in 0..self.config.question_candidates.max(1) {
            let candidate = match self
                .generator
                .generate_question(request, &subset_pois, &pending.history, attempt)
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(depth = pending.depth, attempt, "question generation failed: {:#}", e);
                    continue;
                }
            };
            let split = evaluate_candidate(&pending.subset, candidate);
            if split.score > best.as_ref().map_or(0.0, |b| b.score) {
                best = Some(split);
            }
        }
        best
    }
}

/// Restrict the candidate's branches to the node's subset and score them.
/// POIs the question places in neither branch stay reachable through both.
fn evaluate_candidate(subset: &[String], candidate: QuestionCandidate) -> Split {
    let in_subset: HashSet<&str> = subset.iter().map(String::as_str).collect();
    let clean = |ids: &[String]| -> HashSet<String> {
        ids.iter()
            .filter(|id| in_subset.contains(id.as_str()))
            .cloned()
            .collect()
    };
    let a = clean(candidate.branch_a.as_slice());
    let b = clean(candidate.branch_b.as_slice());
    let covered = a.union(&b).count();
    let n = subset.len();

    let assign = |branch: &HashSet<String>| -> Vec<String> {
        subset
            .iter()
            .filter(|id| branch.contains(*id) || (!a.contains(*id) && !b.contains(*id)))
            .cloned()
            .collect()
    };
    let subset_a = assign(&a);
    let subset_b = assign(&b);
    // An empty side, or a side that keeps every POI, makes no progress.
    let score = if a.is_empty() || b.is_empty() || subset_a.len() == n || subset_b.len() == n {
        0.0
    } else {
        score_partition(n, subset_a.len(), subset_b.len(), covered)
    };
    Split {
        candidate,
        subset_a,
        subset_b,
        score,
    }
}

fn push_subset(tree: &mut DecisionTree, ids: Vec<String>) -> SubsetId {
    tree.subsets.push(ids);
    tree.subsets.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_split_beats_lopsided() {
        let even = score_partition(8, 4, 4, 8);
        let lopsided = score_partition(8, 7, 1, 8);
        assert!((even - 1.0).abs() < 1e-9);
        assert!(even > lopsided);
        assert!(lopsided > 0.0);
        assert_eq!(score_partition(8, 8, 0, 8), 0.0);
        assert_eq!(score_partition(0, 0, 0, 0), 0.0);
    }

    #[test]
    fn test_partial_coverage_is_discounted() {
        // Two of eight each way, four unassigned: both children hold six.
        assert!(score_partition(8, 6, 6, 4) < score_partition(8, 4, 4, 8));
    }

    #[test]
    fn test_unassigned_pois_go_to_both_branches() {
        let subset: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let split = evaluate_candidate(
            &subset,
            QuestionCandidate {
                question: "q".into(),
                option_a: "x".into(),
                option_b: "y".into(),
                branch_a: vec!["a".into(), "ghost".into()],
                branch_b: vec!["b".into()],
            },
        );
        assert_eq!(split.subset_a, vec!["a", "c", "d"]);
        assert_eq!(split.subset_b, vec!["b", "c", "d"]);
        assert!(split.score > 0.0);
    }
}
