//! EVALUATE and REGULARIZE: pure plan-state transitions.

use poiscout_core::plan::{StepVerdict, Verdict};
use poiscout_core::SearchPlan;

use crate::execute::StepResult;

/// Verdict decided for one step in one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedVerdict {
    pub proposed: Verdict,
    pub applied: Verdict,
    pub forced: bool,
}

/// Attach measured recall/quality to each step. Returns, per step, whether
/// the measurement improved on the previous one.
///
/// A step's first measurement never counts as an improvement: there is
/// nothing to improve on.
pub fn apply_metrics(plan: &mut SearchPlan, results: &[StepResult]) -> Vec<bool> {
    let mut improved = vec![false; plan.steps.len()];
    for result in results {
        let Some(step) = plan.steps.get_mut(result.index) else {
            continue;
        };
        let recall = result.execution.recall;
        let quality = result.execution.quality;
        improved[result.index] =
            step.measured && (quality > step.last_quality || recall > step.last_recall);
        step.last_recall = recall;
        step.last_quality = quality;
        step.measured = true;
    }
    improved
}

/// Count stagnation and settle the verdict for every step.
///
/// Steps Reflection did not mention are kept. A `revise` without text
/// degrades to `keep`. Once a step's stagnation count reaches `threshold`
/// the verdict becomes `resample` whatever Reflection proposed. A zero
/// threshold disables the override.
pub fn regularize_verdicts(
    plan: &mut SearchPlan,
    improved: &[bool],
    proposed: &[StepVerdict],
    threshold: u32,
) -> Vec<AppliedVerdict> {
    let mut by_step: Vec<Verdict> = vec![Verdict::Keep; plan.steps.len()];
    for sv in proposed {
        match by_step.get_mut(sv.step) {
            Some(slot) => *slot = sv.verdict.clone(),
            None => tracing::warn!(step = sv.step, steps = plan.steps.len(), "verdict for unknown step ignored"),
        }
    }

    plan.steps
        .iter_mut()
        .zip(by_step)
        .enumerate()
        .map(|(i, (step, proposed))| {
            let proposed = match proposed {
                Verdict::Revise { query_text } if query_text.trim().is_empty() => {
                    tracing::warn!(step = i, "revise without query text treated as keep");
                    Verdict::Keep
                }
                other => other,
            };
            if !improved.get(i).copied().unwrap_or(false) {
                step.stagnation_count += 1;
            }
            let forced = threshold > 0
                && step.stagnation_count >= threshold
                && proposed != Verdict::Resample;
            let applied = if forced || proposed == Verdict::Resample {
                Verdict::Resample
            } else {
                proposed.clone()
            };
            if forced {
                tracing::info!(step = i, topic = %step.topic, stagnation = step.stagnation_count, "stagnation threshold reached, forcing resample");
            }
            AppliedVerdict {
                proposed,
                applied,
                forced,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use poiscout_core::capability::StepExecution;
    use poiscout_core::SearchStep;

    fn result(index: usize, recall: u32, quality: f64) -> StepResult {
        StepResult {
            index,
            execution: StepExecution {
                pois: Vec::new(),
                recall,
                quality,
            },
            failed: false,
        }
    }

    #[test]
    fn test_first_measurement_is_not_improvement() {
        let mut plan = SearchPlan::new(vec![SearchStep::new("t", "q")]);
        assert_eq!(apply_metrics(&mut plan, &[result(0, 4, 0.5)]), vec![false]);
        assert_eq!(apply_metrics(&mut plan, &[result(0, 4, 0.6)]), vec![true]);
        assert_eq!(apply_metrics(&mut plan, &[result(0, 5, 0.1)]), vec![true]);
        assert_eq!(apply_metrics(&mut plan, &[result(0, 5, 0.1)]), vec![false]);
        assert_eq!(plan.steps[0].last_recall, 5);
    }

    #[test]
    fn test_threshold_overrides_revise() {
        let mut plan = SearchPlan::new(vec![SearchStep::new("t", "q")]);
        plan.steps[0].stagnation_count = 1;
        let revise = StepVerdict {
            step: 0,
            verdict: Verdict::Revise {
                query_text: "q2".into(),
            },
        };
        let out = regularize_verdicts(&mut plan, &[false], &[revise], 2);
        assert_eq!(out[0].applied, Verdict::Resample);
        assert!(out[0].forced);
        assert_eq!(plan.steps[0].stagnation_count, 2);
    }

    #[test]
    fn test_improvement_does_not_increment_and_missing_is_keep() {
        let mut plan = SearchPlan::new(vec![SearchStep::new("a", "qa"), SearchStep::new("b", "qb")]);
        let out = regularize_verdicts(&mut plan, &[true, false], &[], 3);
        assert_eq!(out[0].applied, Verdict::Keep);
        assert_eq!(out[1].applied, Verdict::Keep);
        assert_eq!(plan.steps[0].stagnation_count, 0);
        assert_eq!(plan.steps[1].stagnation_count, 1);
    }

    #[test]
    fn test_empty_revise_and_unknown_step() {
        let mut plan = SearchPlan::new(vec![SearchStep::new("a", "qa")]);
        let verdicts = vec![
            StepVerdict {
                step: 0,
                verdict: Verdict::Revise {
                    query_text: "  ".into(),
                },
            },
            StepVerdict {
                step: 7,
                verdict: Verdict::Resample,
            },
        ];
        let out = regularize_verdicts(&mut plan, &[true], &verdicts, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].proposed, Verdict::Keep);
        assert!(!out[0].forced);
    }
}
