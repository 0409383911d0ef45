//! Arena-allocated decision tree.
//!
//! Nodes refer to children and POI subsets by index. The tree is written
//! once by the builder and read-only afterwards.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use poiscout_core::{IntegrityViolation, Poi};
use serde::{Deserialize, Serialize};

pub type NodeId = usize;
pub type SubsetId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Decision {
        question: String,
        option_a: String,
        option_b: String,
        branch_a: NodeId,
        branch_b: NodeId,
        /// POIs reaching this node.
        subset: SubsetId,
        depth: usize,
    },
    Leaf {
        subset: SubsetId,
        depth: usize,
    },
}

impl Node {
    pub fn subset(&self) -> SubsetId {
        match self {
            Self::Decision { subset, .. } | Self::Leaf { subset, .. } => *subset,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::Decision { depth, .. } | Self::Leaf { depth, .. } => *depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// Which option the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    A,
    B,
}

impl Answer {
    /// Accepts `a`/`b` (any case) or `1`/`2`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "1" => Some(Self::A),
            "b" | "2" => Some(Self::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub task_id: String,
    #[serde(default)]
    pub request: String,
    pub created_at: DateTime<Utc>,
    pub leaf_threshold: usize,
    pub max_depth: usize,
    /// Every POI the tree was built from, in pool order.
    pub pool: Vec<Poi>,
    /// POI-id subsets referenced by nodes.
    pub subsets: Vec<Vec<String>>,
    pub nodes: Vec<Node>,
    pub root: NodeId,
}

impl DecisionTree {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.get(self.root)
    }

    /// Longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(Node::depth).max().unwrap_or(0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Resolve a subset to POIs, in pool order.
    pub fn subset_pois(&self, subset: SubsetId) -> Vec<Poi> {
        let Some(ids) = self.subsets.get(subset) else {
            return Vec::new();
        };
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.pool
            .iter()
            .filter(|p| wanted.contains(p.id.as_str()))
            .cloned()
            .collect()
    }

    /// Child reached from decision node `id` by `answer`.
    pub fn child(&self, id: NodeId, answer: Answer) -> Option<NodeId> {
        match self.nodes.get(id)? {
            Node::Decision {
                branch_a, branch_b, ..
            } => Some(match answer {
                Answer::A => *branch_a,
                Answer::B => *branch_b,
            }),
            Node::Leaf { .. } => None,
        }
    }

    /// Structural checks applied to any tree coming back from storage.
    ///
    /// Every index must resolve, every subset id must name a pool POI, and
    /// each node must be reachable from the root exactly once.
    pub fn validate(&self) -> Result<(), IntegrityViolation> {
        let bad = |reason: String| IntegrityViolation::MalformedTree {
            task_id: self.task_id.clone(),
            reason,
        };

        let mut pool_ids = HashSet::new();
        for poi in &self.pool {
            if !pool_ids.insert(poi.id.as_str()) {
                return Err(bad(format!("duplicate POI id '{}' in pool", poi.id)));
            }
        }
        for (i, subset) in self.subsets.iter().enumerate() {
            if let Some(unknown) = subset.iter().find(|id| !pool_ids.contains(id.as_str())) {
                return Err(bad(format!("subset {} references unknown POI '{}'", i, unknown)));
            }
        }
        if self.root >= self.nodes.len() {
            return Err(bad(format!("root {} out of range ({} nodes)", self.root, self.nodes.len())));
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, expected_depth)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                return Err(bad(format!("child index {} out of range", id)));
            };
            if std::mem::replace(&mut seen[id], true) {
                return Err(bad(format!("node {} reachable more than once", id)));
            }
            if node.subset() >= self.subsets.len() {
                return Err(bad(format!("node {} references missing subset {}", id, node.subset())));
            }
            if node.depth() != expected_depth {
                return Err(bad(format!(
                    "node {} has depth {}, expected {}",
                    id,
                    node.depth(),
                    expected_depth
                )));
            }
            if let Node::Decision {
                branch_a, branch_b, ..
            } = node
            {
                stack.push((*branch_b, expected_depth + 1));
                stack.push((*branch_a, expected_depth + 1));
            }
        }
        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(bad(format!("node {} is not reachable from the root", orphan)));
        }
        Ok(())
    }
}
