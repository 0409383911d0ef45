//! Online optimizer: the on-policy reflection loop over a search plan.
//!
//! Each iteration runs EXECUTE → EVALUATE → REFLECT → REGULARIZE → APPLY.
//! Only the capability calls (executor, reflection, query generation) are
//! awaited; plan mutation and pool merges are plain synchronous code.

mod error;
mod execute;
mod optimizer;
mod outcome;
mod regularize;

pub use error::OptimizationIncomplete;
pub use execute::StepResult;
pub use optimizer::OnlineOptimizer;
pub use outcome::{IterationRecord, OptimizationOutcome, RunStatus, StepRecord};
pub use regularize::{apply_metrics, regularize_verdicts, AppliedVerdict};
