use poiscout_core::plan::VerdictKind;
use poiscout_core::{IntegrityViolation, OptimizationTrajectory, PoiPool, SearchPlan};
use serde::{Deserialize, Serialize};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Reached `max_iterations`.
    Exhausted,
    /// Mean quality stopped moving for two consecutive iterations.
    Converged,
    /// Cancel flag observed at an iteration boundary.
    Cancelled,
    /// Reflection failed; see [`crate::OptimizationIncomplete`].
    Incomplete,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Converged => "converged",
            Self::Cancelled => "cancelled",
            Self::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub topic: String,
    pub recall: u32,
    pub quality: f64,
    pub improved: bool,
    pub stagnation_count: u32,
    /// What Reflection asked for (`keep` when it said nothing).
    pub proposed: VerdictKind,
    pub applied: VerdictKind,
    /// True when stagnation overrode the proposed verdict.
    pub forced: bool,
    /// Executor failed or timed out; metrics were zeroed.
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub mean_quality: f64,
    pub pool_size: usize,
    pub new_pois: usize,
    pub steps: Vec<StepRecord>,
}

/// Everything an optimization run produced.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    /// Plan after the last APPLY; feeding it back in continues the run.
    pub final_plan: SearchPlan,
    pub pool: PoiPool,
    pub trajectory: OptimizationTrajectory,
    pub iterations: Vec<IterationRecord>,
    pub integrity_violations: Vec<IntegrityViolation>,
    pub status: RunStatus,
}

impl OptimizationOutcome {
    /// Verdicts actually applied to step `index`, one per iteration.
    pub fn applied_verdicts(&self, index: usize) -> Vec<VerdictKind> {
        self.iterations
            .iter()
            .filter_map(|it| it.steps.get(index).map(|s| s.applied))
            .collect()
    }
}
