use poiscout_core::CapabilityError;
use thiserror::Error;

use crate::outcome::OptimizationOutcome;

/// Reflection failed mid-run. The best plan and pool reached so far are kept
/// in `partial`; the caller decides whether to use them.
#[derive(Debug, Error)]
#[error("optimization incomplete after {} iteration(s): {source}", .partial.trajectory.iterations)]
pub struct OptimizationIncomplete {
    pub partial: Box<OptimizationOutcome>,
    #[source]
    pub source: CapabilityError,
}

impl OptimizationIncomplete {
    pub fn into_partial(self) -> OptimizationOutcome {
        *self.partial
    }
}
