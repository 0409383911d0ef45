//! EXECUTE phase: bounded-concurrency dispatch of every step in a plan.

use std::time::Duration;

use futures_util::{stream, StreamExt};
use poiscout_core::capability::{Executor, StepExecution};
use poiscout_core::SearchPlan;

/// Result for one step, in plan order.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub index: usize,
    pub execution: StepExecution,
    /// Executor error, timeout, or a non-finite quality. `execution` is zeroed.
    pub failed: bool,
}

/// Run every step, at most `concurrency` at a time, and wait for all of them.
///
/// A failed or timed-out step yields an empty, zero-metric result; it never
/// aborts the batch. A zero `timeout` disables the per-step deadline.
pub(crate) async fn execute_plan(
    executor: &dyn Executor,
    plan: &SearchPlan,
    concurrency: usize,
    timeout: Duration,
) -> Vec<StepResult> {
    stream::iter(plan.steps.iter().enumerate())
        .map(|(index, step)| async move {
            let call = executor.execute(step);
            let result = if timeout.is_zero() {
                Ok(call.await)
            } else {
                tokio::time::timeout(timeout, call).await
            };
            match result {
                Ok(Ok(execution)) if execution.quality.is_finite() => StepResult {
                    index,
                    execution,
                    failed: false,
                },
                Ok(Ok(execution)) => {
                    tracing::warn!(step = index, topic = %step.topic, quality = execution.quality, "non-finite quality, recording zero");
                    zeroed(index)
                }
                Ok(Err(e)) => {
                    tracing::warn!(step = index, topic = %step.topic, "executor failed: {:#}", e);
                    zeroed(index)
                }
                Err(_) => {
                    tracing::warn!(step = index, topic = %step.topic, timeout_ms = timeout.as_millis() as u64, "executor timed out");
                    zeroed(index)
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

fn zeroed(index: usize) -> StepResult {
    StepResult {
        index,
        execution: StepExecution::empty(),
        failed: true,
    }
}
