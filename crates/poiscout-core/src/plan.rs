//! Search plans and reflection verdicts.

use serde::{Deserialize, Serialize};

/// One topic-scoped search step. Owned by its [`SearchPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStep {
    pub topic: String,
    pub query_text: String,
    #[serde(default)]
    pub revision_count: u32,
    #[serde(default)]
    pub stagnation_count: u32,
    #[serde(default)]
    pub last_recall: u32,
    #[serde(default)]
    pub last_quality: f64,
    /// False until the step has been executed at least once.
    #[serde(default)]
    pub measured: bool,
}

impl SearchStep {
    pub fn new(topic: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            query_text: query_text.into(),
            revision_count: 0,
            stagnation_count: 0,
            last_recall: 0,
            last_quality: 0.0,
            measured: false,
        }
    }
}

/// Ordered set of search steps plus the iteration it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub steps: Vec<SearchStep>,
    #[serde(default)]
    pub iteration: u32,
}

impl SearchPlan {
    pub fn new(steps: Vec<SearchStep>) -> Self {
        Self {
            steps,
            iteration: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Immutable copy taken for trajectory comparison.
    pub fn snapshot(&self) -> SearchPlan {
        self.clone()
    }

    /// Mean of the last measured quality over all steps (0.0 for an empty plan).
    pub fn mean_quality(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.steps.iter().map(|s| s.last_quality).sum::<f64>() / self.steps.len() as f64
    }

    pub fn total_recall(&self) -> u64 {
        self.steps.iter().map(|s| s.last_recall as u64).sum()
    }
}

/// Closed verdict returned by Reflection for a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Keep,
    Revise { query_text: String },
    Resample,
}

impl Verdict {
    pub fn kind(&self) -> VerdictKind {
        match self {
            Self::Keep => VerdictKind::Keep,
            Self::Revise { .. } => VerdictKind::Revise,
            Self::Resample => VerdictKind::Resample,
        }
    }
}

/// Payload-free verdict tag, used in iteration logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Keep,
    Revise,
    Resample,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Revise => "revise",
            Self::Resample => "resample",
        }
    }
}

impl std::fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict addressed to a step by its position in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepVerdict {
    pub step: usize,
    #[serde(flatten)]
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serde_shape() {
        let v = StepVerdict {
            step: 2,
            verdict: Verdict::Revise {
                query_text: "family aquarium tickets".into(),
            },
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["step"], 2);
        assert_eq!(json["verdict"], "revise");
        assert_eq!(json["query_text"], "family aquarium tickets");

        let keep: StepVerdict = serde_json::from_str(r#"{"step":0,"verdict":"keep"}"#).unwrap();
        assert_eq!(keep.verdict, Verdict::Keep);
    }

    #[test]
    fn test_plan_aggregates() {
        let mut plan = SearchPlan::new(vec![SearchStep::new("a", "qa"), SearchStep::new("b", "qb")]);
        plan.steps[0].last_quality = 0.4;
        plan.steps[0].last_recall = 3;
        plan.steps[1].last_quality = 0.8;
        plan.steps[1].last_recall = 5;
        assert!((plan.mean_quality() - 0.6).abs() < 1e-9);
        assert_eq!(plan.total_recall(), 8);
        assert_eq!(SearchPlan::default().mean_quality(), 0.0);
    }
}
