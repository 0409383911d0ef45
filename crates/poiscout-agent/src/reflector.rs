use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use poiscout_core::capability::{Reflection, Reflector};
use poiscout_core::SearchPlan;

use crate::llm::{retry_temperature, ChatLlm, ChatMessage};
use crate::parse::parse_reflection;
use crate::prompts;

const REFLECT_TEMPERATURE: f64 = 0.2;

pub struct LlmReflector {
    llm: Arc<dyn ChatLlm>,
    model: String,
}

impl LlmReflector {
    pub fn new(llm: Arc<dyn ChatLlm>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

/// One line per step, in the layout the reflection prompt documents.
pub(crate) fn render_plan(plan: &SearchPlan) -> String {
    plan.steps
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[{}] {} | {} | {} | {:.2} | {} | {}",
                i, s.topic, s.query_text, s.last_recall, s.last_quality, s.revision_count, s.stagnation_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(&self, request: &str, plan: &SearchPlan, attempt: usize) -> Result<Reflection> {
        let plan_text = render_plan(plan);
        let prompt = prompts::render(
            prompts::REFLECT,
            &[("request", request), ("plan", &plan_text)],
        );
        let content = self
            .llm
            .complete(
                &[ChatMessage::user(&prompt)],
                &self.model,
                retry_temperature(REFLECT_TEMPERATURE, attempt),
            )
            .await
            .context("reflection failed")?;
        let reflection = parse_reflection(&content, plan.len())?;
        tracing::debug!(
            iteration = plan.iteration,
            verdicts = reflection.verdicts.len(),
            "reflection parsed"
        );
        Ok(reflection)
    }
}
