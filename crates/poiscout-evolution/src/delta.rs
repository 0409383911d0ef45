//! Trajectory delta: what changed between the first and the last plan of one
//! optimization run, computed once per trajectory.

use std::fmt::Write as _;

use poiscout_core::{OptimizationTrajectory, SearchStep};
use serde::{Deserialize, Serialize};

/// Before/after view of one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepChange {
    pub topic: String,
    pub query_before: String,
    pub query_after: String,
    pub revisions: u32,
    /// Quality of the last measurement; `None` if the step never ran.
    pub quality_after: Option<f64>,
    pub recall_after: Option<u32>,
}

impl StepChange {
    pub fn query_changed(&self) -> bool {
        self.query_before.trim() != self.query_after.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryDelta {
    pub changes: Vec<StepChange>,
    /// Topics present only in the final plan.
    pub added_topics: Vec<String>,
    /// Topics present only in the initial plan.
    pub dropped_topics: Vec<String>,
    pub pois_before: usize,
    pub pois_after: usize,
    pub pois_gained: usize,
    pub mean_quality_after: f64,
}

impl TrajectoryDelta {
    /// `None` when nothing changed: no query was rewritten, no topic was
    /// added or dropped and no POI was gained.
    pub fn between(trajectory: &OptimizationTrajectory) -> Option<Self> {
        let before: &[SearchStep] = &trajectory.plan_before.steps;
        let after: &[SearchStep] = &trajectory.plan_after.steps;
        let find = |steps: &[SearchStep], topic: &str| steps.iter().position(|s| s.topic == topic);

        let changes: Vec<StepChange> = before
            .iter()
            .filter_map(|b| {
                let a = &after[find(after, b.topic.as_str())?];
                Some(StepChange {
                    topic: b.topic.clone(),
                    query_before: b.query_text.clone(),
                    query_after: a.query_text.clone(),
                    revisions: a.revision_count.saturating_sub(b.revision_count),
                    quality_after: a.measured.then_some(a.last_quality),
                    recall_after: a.measured.then_some(a.last_recall),
                })
            })
            .collect();
        let added_topics: Vec<String> = after
            .iter()
            .filter(|a| find(before, a.topic.as_str()).is_none())
            .map(|a| a.topic.clone())
            .collect();
        let dropped_topics: Vec<String> = before
            .iter()
            .filter(|b| find(after, b.topic.as_str()).is_none())
            .map(|b| b.topic.clone())
            .collect();
        let pois_gained = trajectory.gained_pois().len();

        let nothing_changed = !changes.iter().any(StepChange::query_changed)
            && added_topics.is_empty()
            && dropped_topics.is_empty()
            && pois_gained == 0;
        if nothing_changed {
            return None;
        }

        Some(Self {
            changes,
            added_topics,
            dropped_topics,
            pois_before: trajectory.pois_before.len(),
            pois_after: trajectory.pois_after.len(),
            pois_gained,
            mean_quality_after: trajectory.plan_after.mean_quality(),
        })
    }

    /// Plain-text report handed to the summarizer.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "POIs: {} -> {} ({} new). Final mean quality {:.2}.",
            self.pois_before, self.pois_after, self.pois_gained, self.mean_quality_after
        );
        for c in self.changes.iter().filter(|c| c.query_changed()) {
            let _ = write!(
                out,
                "- topic \"{}\": \"{}\" -> \"{}\" after {} revision(s)",
                c.topic, c.query_before, c.query_after, c.revisions
            );
            match (c.quality_after, c.recall_after) {
                (Some(q), Some(r)) => {
                    let _ = writeln!(out, ", now quality {:.2} / recall {}", q, r);
                }
                _ => out.push('\n'),
            }
        }
        let unchanged: Vec<&str> = self
            .changes
            .iter()
            .filter(|c| !c.query_changed())
            .map(|c| c.topic.as_str())
            .collect();
        if !unchanged.is_empty() {
            let _ = writeln!(out, "Kept as-is: {}", unchanged.join(", "));
        }
        if !self.added_topics.is_empty() {
            let _ = writeln!(out, "Added topics: {}", self.added_topics.join(", "));
        }
        if !self.dropped_topics.is_empty() {
            let _ = writeln!(out, "Dropped topics: {}", self.dropped_topics.join(", "));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poiscout_core::SearchPlan;

    fn trajectory(after_query: &str, pois_after: &[&str]) -> OptimizationTrajectory {
        let before = SearchPlan::new(vec![
            SearchStep::new("museums", "museums shanghai"),
            SearchStep::new("parks", "parks shanghai"),
        ]);
        let mut after = before.clone();
        after.steps[0].query_text = after_query.to_string();
        after.steps[0].revision_count = 2;
        after.steps[0].measured = true;
        after.steps[0].last_quality = 0.75;
        after.steps[0].last_recall = 6;
        OptimizationTrajectory {
            task_id: "t1".into(),
            request: "rainy day with kids".into(),
            plan_before: before,
            plan_after: after,
            pois_before: ["a", "b"].iter().map(|s| s.to_string()).collect(),
            pois_after: pois_after.iter().map(|s| s.to_string()).collect(),
            reflection_notes: String::new(),
            iterations: 2,
        }
    }

    #[test]
    fn test_delta_reports_changed_queries() {
        let delta = TrajectoryDelta::between(&trajectory("indoor attractions for kids", &["a", "b", "c"])).unwrap();
        assert_eq!(delta.pois_gained, 1);
        assert!(delta.changes[0].query_changed());
        assert!(!delta.changes[1].query_changed());
        let report = delta.render();
        assert!(report.contains("\"museums shanghai\" -> \"indoor attractions for kids\""));
        assert!(report.contains("quality 0.75 / recall 6"));
        assert!(report.contains("Kept as-is: parks"));
    }

    #[test]
    fn test_no_delta_when_nothing_moved() {
        assert!(TrajectoryDelta::between(&trajectory("museums shanghai", &["a", "b"])).is_none());
    }
}
