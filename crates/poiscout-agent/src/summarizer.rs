use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use poiscout_core::capability::Summarizer;
use poiscout_core::OptimizationTrajectory;

use crate::llm::{ChatLlm, ChatMessage};
use crate::parse::parse_skill_text;
use crate::prompts;

const SUMMARIZE_TEMPERATURE: f64 = 0.3;
/// Longer guidance is truncated; skills are injected into every plan prompt.
const MAX_SKILL_CHARS: usize = 600;

pub struct LlmSummarizer {
    llm: Arc<dyn ChatLlm>,
    model: String,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn ChatLlm>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize_delta(
        &self,
        trajectory: &OptimizationTrajectory,
        delta_report: &str,
    ) -> Result<String> {
        let notes = if trajectory.reflection_notes.trim().is_empty() {
            "(none)"
        } else {
            trajectory.reflection_notes.as_str()
        };
        let prompt = prompts::render(
            prompts::SUMMARIZE,
            &[
                ("request", trajectory.request.as_str()),
                ("delta", delta_report),
                ("notes", notes),
            ],
        );
        let content = self
            .llm
            .complete(&[ChatMessage::user(&prompt)], &self.model, SUMMARIZE_TEMPERATURE)
            .await
            .context("skill summarization failed")?;
        let mut text = parse_skill_text(&content);
        if text.chars().count() > MAX_SKILL_CHARS {
            text = text.chars().take(MAX_SKILL_CHARS).collect();
        }
        Ok(text)
    }
}
