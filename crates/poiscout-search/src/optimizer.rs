//! The iteration state machine.

use std::collections::BTreeSet;
use std::sync::Arc;

use poiscout_core::capability::{Executor, Planner, Reflection, Reflector};
use poiscout_core::config::OptimizerConfig;
use poiscout_core::observability::audit_optimization_finished;
use poiscout_core::plan::Verdict;
use poiscout_core::{
    CancelFlag, CapabilityError, IntegrityViolation, OptimizationTrajectory, PoiPool, SearchPlan,
};
use tracing::Instrument;

use crate::error::OptimizationIncomplete;
use crate::execute::{execute_plan, StepResult};
use crate::outcome::{IterationRecord, OptimizationOutcome, RunStatus, StepRecord};
use crate::regularize::{apply_metrics, regularize_verdicts, AppliedVerdict};

/// Drives a plan through repeated execute/reflect rounds.
///
/// Capabilities are injected; the optimizer holds no global state and can be
/// reused across tasks.
pub struct OnlineOptimizer {
    planner: Arc<dyn Planner>,
    executor: Arc<dyn Executor>,
    reflector: Arc<dyn Reflector>,
    config: OptimizerConfig,
    cancel: CancelFlag,
}

/// Mutable state of one run.
struct RunState {
    task_id: String,
    request: String,
    plan_before: SearchPlan,
    plan: SearchPlan,
    pool: PoiPool,
    pois_before: Option<BTreeSet<String>>,
    notes: Vec<String>,
    records: Vec<IterationRecord>,
    violations: Vec<IntegrityViolation>,
    completed: u32,
}

impl RunState {
    fn finish(self, status: RunStatus) -> OptimizationOutcome {
        let trajectory = OptimizationTrajectory {
            task_id: self.task_id,
            request: self.request,
            plan_before: self.plan_before,
            plan_after: self.plan.snapshot(),
            pois_before: self.pois_before.unwrap_or_default(),
            pois_after: self.pool.ids(),
            reflection_notes: self.notes.join("\n"),
            iterations: self.completed,
        };
        audit_optimization_finished(
            &trajectory.task_id,
            status.as_str(),
            trajectory.iterations,
            trajectory.pois_before.len(),
            trajectory.pois_after.len(),
        );
        tracing::info!(
            status = status.as_str(),
            iterations = trajectory.iterations,
            pois = self.pool.len(),
            "optimization finished"
        );
        OptimizationOutcome {
            final_plan: self.plan,
            pool: self.pool,
            trajectory,
            iterations: self.records,
            integrity_violations: self.violations,
            status,
        }
    }
}

impl OnlineOptimizer {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: Arc<dyn Executor>,
        reflector: Arc<dyn Reflector>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            planner,
            executor,
            reflector,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Observe `cancel` between iterations.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// One EXECUTE pass with no reflection, for runs with online
    /// optimization switched off. Conflicting POIs are returned alongside
    /// the pool.
    pub async fn execute_once(&self, plan: &SearchPlan) -> (PoiPool, Vec<IntegrityViolation>) {
        let results = execute_plan(
            self.executor.as_ref(),
            plan,
            self.config.concurrency,
            self.config.step_timeout(),
        )
        .await;
        let mut pool = PoiPool::new();
        let mut violations = Vec::new();
        for result in &results {
            for poi in &result.execution.pois {
                if let Err(violation) = pool.merge(poi.clone()) {
                    tracing::warn!("{}", violation);
                    violations.push(violation);
                }
            }
        }
        tracing::info!(steps = plan.len(), pois = pool.len(), "plan executed without optimization");
        (pool, violations)
    }

    /// Run up to `max_iterations` iterations on `initial_plan`.
    ///
    /// Returns `Err(OptimizationIncomplete)` only when Reflection still fails
    /// after its retries; the error still carries the plan and pool reached
    /// so far.
    pub async fn optimize(
        &self,
        task_id: &str,
        request: &str,
        initial_plan: SearchPlan,
    ) -> Result<OptimizationOutcome, OptimizationIncomplete> {
        let mut state = RunState {
            task_id: task_id.to_string(),
            request: request.to_string(),
            plan_before: initial_plan.snapshot(),
            plan: initial_plan,
            pool: PoiPool::new(),
            pois_before: None,
            notes: Vec::new(),
            records: Vec::new(),
            violations: Vec::new(),
            completed: 0,
        };

        if state.plan.is_empty() || self.config.max_iterations == 0 {
            tracing::warn!(steps = state.plan.len(), max_iterations = self.config.max_iterations, "nothing to optimize");
            return Ok(state.finish(RunStatus::Exhausted));
        }

        let mut prev_mean: Option<f64> = None;
        let mut flat_streak = 0u32;

        let status = loop {
            if self.cancel.is_cancelled() {
                tracing::info!(completed = state.completed, "optimization cancelled at iteration boundary");
                break RunStatus::Cancelled;
            }
            let iteration = state.plan.iteration + 1;
            let span = tracing::info_span!("optimize", iteration);

            // EXECUTE
            let results = execute_plan(
                self.executor.as_ref(),
                &state.plan,
                self.config.concurrency,
                self.config.step_timeout(),
            )
            .instrument(span.clone())
            .await;

            // EVALUATE: only after every dispatched step has returned
            let pool_before_iter = state.pool.len();
            let improved = span.in_scope(|| self.evaluate(&mut state, iteration, &results));
            if state.pois_before.is_none() {
                state.pois_before = Some(state.pool.ids());
            }
            let mean_quality = state.plan.mean_quality();

            // REFLECT
            let reflection = match self.reflect(&state).instrument(span.clone()).await {
                Ok(r) => r,
                Err(source) => {
                    tracing::warn!(iteration, "reflection failed, returning partial result: {}", source);
                    return Err(OptimizationIncomplete {
                        partial: Box::new(state.finish(RunStatus::Incomplete)),
                        source,
                    });
                }
            };
            let notes = reflection.notes.trim();
            if !notes.is_empty() && !state.notes.iter().any(|n| n == notes) {
                state.notes.push(notes.to_string());
            }

            // REGULARIZE
            let verdicts = regularize_verdicts(
                &mut state.plan,
                &improved,
                &reflection.verdicts,
                self.config.regularization_threshold,
            );

            // APPLY
            let applied = self.apply(&mut state.plan, verdicts).instrument(span.clone()).await;

            let steps = state
                .plan
                .steps
                .iter()
                .zip(&results)
                .zip(&improved)
                .zip(applied)
                .map(|(((step, result), improved), verdict)| StepRecord {
                    topic: step.topic.clone(),
                    recall: result.execution.recall,
                    quality: result.execution.quality,
                    improved: *improved,
                    stagnation_count: step.stagnation_count,
                    proposed: verdict.proposed.kind(),
                    applied: verdict.applied.kind(),
                    forced: verdict.forced,
                    failed: result.failed,
                })
                .collect();
            state.records.push(IterationRecord {
                iteration,
                mean_quality,
                pool_size: state.pool.len(),
                new_pois: state.pool.len() - pool_before_iter,
                steps,
            });
            state.completed += 1;
            span.in_scope(|| {
                tracing::info!(mean_quality, pool = state.pool.len(), "iteration complete");
            });

            // A drop in quality counts as no improvement.
            if let Some(prev) = prev_mean {
                if mean_quality - prev < self.config.convergence_epsilon {
                    flat_streak += 1;
                } else {
                    flat_streak = 0;
                }
            }
            prev_mean = Some(mean_quality);

            if state.completed >= self.config.max_iterations {
                break RunStatus::Exhausted;
            }
            if flat_streak >= 2 {
                break RunStatus::Converged;
            }
        };

        Ok(state.finish(status))
    }

    fn evaluate(&self, state: &mut RunState, iteration: u32, results: &[StepResult]) -> Vec<bool> {
        for result in results {
            for poi in &result.execution.pois {
                if let Err(violation) = state.pool.merge(poi.clone()) {
                    tracing::warn!("{}", violation);
                    state.violations.push(violation);
                }
            }
        }
        state.plan.iteration = iteration;
        let improved = apply_metrics(&mut state.plan, results);
        for (step, result) in state.plan.steps.iter().zip(results) {
            tracing::debug!(
                topic = %step.topic,
                recall = result.execution.recall,
                quality = result.execution.quality,
                failed = result.failed,
                "step measured"
            );
        }
        improved
    }

    /// Up to `1 + retries` attempts, each bounded by the step timeout. Only
    /// the last failure is returned.
    async fn reflect(&self, state: &RunState) -> Result<Reflection, CapabilityError> {
        let timeout = self.config.step_timeout();
        let mut attempt = 0usize;
        loop {
            let call = self.reflector.reflect(&state.request, &state.plan, attempt);
            let result = if timeout.is_zero() {
                call.await.map_err(|e| CapabilityError::failed("reflection", e))
            } else {
                match tokio::time::timeout(timeout, call).await {
                    Ok(r) => r.map_err(|e| CapabilityError::failed("reflection", e)),
                    Err(_) => Err(CapabilityError::TimedOut {
                        capability: "reflection",
                        after: timeout,
                    }),
                }
            };
            match result {
                Ok(reflection) => return Ok(reflection),
                Err(e) if attempt < self.config.retries as usize => {
                    attempt += 1;
                    tracing::warn!(attempt, retries = self.config.retries, "reflection failed, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns the verdicts as actually applied. A resample whose query
    /// generation fails leaves the step untouched and is reported as keep.
    async fn apply(&self, plan: &mut SearchPlan, verdicts: Vec<AppliedVerdict>) -> Vec<AppliedVerdict> {
        let mut out = Vec::with_capacity(verdicts.len());
        for (step, mut verdict) in plan.steps.iter_mut().zip(verdicts) {
            match &verdict.applied {
                Verdict::Keep => {}
                Verdict::Revise { query_text } => {
                    tracing::debug!(topic = %step.topic, from = %step.query_text, to = %query_text, "revise");
                    step.query_text = query_text.clone();
                    step.revision_count += 1;
                }
                Verdict::Resample => match self.planner.generate_query(&step.topic, true).await {
                    Ok(query) if !query.trim().is_empty() => {
                        tracing::debug!(topic = %step.topic, to = %query, "resample");
                        step.query_text = query;
                        step.revision_count += 1;
                        step.stagnation_count = 0;
                    }
                    Ok(_) => {
                        tracing::warn!(topic = %step.topic, "resample produced an empty query, step unchanged");
                        verdict.applied = Verdict::Keep;
                    }
                    Err(e) => {
                        tracing::warn!(topic = %step.topic, "resample query generation failed, step unchanged: {:#}", e);
                        verdict.applied = Verdict::Keep;
                    }
                },
            }
            out.push(verdict);
        }
        out
    }
}
