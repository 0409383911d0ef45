//! Plan and query generation.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use poiscout_core::capability::Planner;
use poiscout_core::{SearchPlan, Skill};

use crate::llm::{retry_temperature, ChatLlm, ChatMessage};
use crate::parse::{parse_plan, parse_query};
use crate::prompts;

const PLAN_TEMPERATURE: f64 = 0.7;
const QUERY_TEMPERATURE: f64 = 0.4;
const DIVERSIFY_TEMPERATURE: f64 = 1.0;

const REFINE_INSTRUCTION: &str =
    "Write the most effective search query for this topic, as a person would type it.";
const DIVERSIFY_INSTRUCTION: &str = "Earlier queries for this topic stopped finding new places. \
Write a query that is structurally different from the usual phrasing: change the angle \
(audience, source type, neighbourhood, occasion, list vs. review), not just the wording.";

pub struct LlmPlanner {
    llm: Arc<dyn ChatLlm>,
    model: String,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn ChatLlm>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

fn render_skills(skills: &[Skill]) -> String {
    if skills.is_empty() {
        return "(none)".to_string();
    }
    skills
        .iter()
        .map(|s| format!("- {}", s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn generate_plan(&self, request: &str, skills: &[Skill], attempt: usize) -> Result<SearchPlan> {
        let skills_text = render_skills(skills);
        let prompt = prompts::render(
            prompts::PLAN,
            &[("request", request), ("skills", &skills_text)],
        );
        let content = self
            .llm
            .complete(
                &[ChatMessage::user(&prompt)],
                &self.model,
                retry_temperature(PLAN_TEMPERATURE, attempt),
            )
            .await
            .context("plan generation failed")?;
        let plan = parse_plan(&content)?;
        tracing::info!(steps = plan.len(), skills = skills.len(), "initial plan generated");
        Ok(plan)
    }

    async fn generate_query(&self, topic: &str, diversify: bool) -> Result<String> {
        let (instruction, temperature) = if diversify {
            (DIVERSIFY_INSTRUCTION, DIVERSIFY_TEMPERATURE)
        } else {
            (REFINE_INSTRUCTION, QUERY_TEMPERATURE)
        };
        let prompt = prompts::render(
            prompts::QUERY,
            &[("topic", topic), ("instruction", instruction)],
        );
        let content = self
            .llm
            .complete(&[ChatMessage::user(&prompt)], &self.model, temperature)
            .await
            .context("query generation failed")?;
        let query = parse_query(&content)?;
        tracing::debug!(topic, diversify, query = %query, "query generated");
        Ok(query)
    }
}
