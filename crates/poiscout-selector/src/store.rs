//! Decision tree persistence, keyed by task id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use poiscout_core::observability::audit_tree_saved;
use poiscout_core::IntegrityViolation;
use poiscout_store::{DocumentStore, TREES_NS};
use serde::Serialize;

use crate::error::SelectorError;
use crate::tree::DecisionTree;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSummary {
    pub task_id: String,
    pub request: String,
    pub created_at: DateTime<Utc>,
    pub poi_count: usize,
}

pub struct TreeStore {
    store: Arc<dyn DocumentStore>,
}

impl TreeStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Validate, then overwrite any tree stored under the same task id.
    pub fn save(&self, tree: &DecisionTree) -> Result<(), SelectorError> {
        tree.validate()?;
        let doc = serde_json::to_value(tree).map_err(|source| SelectorError::Encode {
            task_id: tree.task_id.clone(),
            source,
        })?;
        self.store.put(TREES_NS, &tree.task_id, &doc)?;
        tracing::info!(task = %tree.task_id, nodes = tree.nodes.len(), "decision tree saved");
        audit_tree_saved(&tree.task_id, tree.pool.len(), tree.nodes.len());
        Ok(())
    }

    /// `Ok(None)` if no tree exists; `Integrity` if the stored one is malformed.
    pub fn load(&self, task_id: &str) -> Result<Option<DecisionTree>, SelectorError> {
        let Some(doc) = self.store.get(TREES_NS, task_id)? else {
            return Ok(None);
        };
        let tree = decode(task_id, doc)?;
        Ok(Some(tree))
    }

    /// Summaries of every stored tree, newest first.
    pub fn list(&self) -> Result<Vec<TreeSummary>, SelectorError> {
        let mut summaries = Vec::new();
        for (key, doc) in self.store.list(TREES_NS)? {
            let tree = decode(&key, doc)?;
            summaries.push(TreeSummary {
                task_id: tree.task_id,
                request: tree.request,
                created_at: tree.created_at,
                poi_count: tree.pool.len(),
            });
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.task_id.cmp(&b.task_id)));
        Ok(summaries)
    }
}

fn decode(key: &str, doc: serde_json::Value) -> Result<DecisionTree, SelectorError> {
    let tree: DecisionTree =
        serde_json::from_value(doc).map_err(|e| IntegrityViolation::MalformedTree {
            task_id: key.to_string(),
            reason: e.to_string(),
        })?;
    if tree.task_id != key {
        return Err(IntegrityViolation::MalformedTree {
            task_id: key.to_string(),
            reason: format!("document holds task '{}'", tree.task_id),
        }
        .into());
    }
    tree.validate()?;
    Ok(tree)
}
