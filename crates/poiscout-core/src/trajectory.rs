//! Before/after record of one optimization run, consumed by the distiller.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::plan::SearchPlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTrajectory {
    /// Task (request) the run belonged to; becomes a skill's `source_task_id`.
    pub task_id: String,
    pub request: String,
    pub plan_before: SearchPlan,
    pub plan_after: SearchPlan,
    pub pois_before: BTreeSet<String>,
    pub pois_after: BTreeSet<String>,
    pub reflection_notes: String,
    /// Completed iterations.
    pub iterations: u32,
}

impl OptimizationTrajectory {
    /// POI ids found by the optimized plan that the initial plan never surfaced.
    pub fn gained_pois(&self) -> BTreeSet<String> {
        self.pois_after
            .difference(&self.pois_before)
            .cloned()
            .collect()
    }
}
