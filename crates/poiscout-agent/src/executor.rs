//! Model-backed stand-in for the web crawler.
//!
//! The real executor fetches pages and extracts places; this one asks the
//! model what a search for the step's query would surface. It is scoped to
//! one request so matches can be judged against it.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use poiscout_core::capability::{Executor, StepExecution};
use poiscout_core::SearchStep;

use crate::llm::{ChatLlm, ChatMessage};
use crate::parse::parse_execution;
use crate::prompts;

const EXECUTE_TEMPERATURE: f64 = 0.3;
const DEFAULT_LIMIT: usize = 10;

pub struct LlmExecutor {
    llm: Arc<dyn ChatLlm>,
    model: String,
    request: String,
    limit: usize,
}

impl LlmExecutor {
    pub fn new(llm: Arc<dyn ChatLlm>, model: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            request: request.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

#[async_trait]
impl Executor for LlmExecutor {
    async fn execute(&self, step: &SearchStep) -> Result<StepExecution> {
        let limit = self.limit.to_string();
        let prompt = prompts::render(
            prompts::EXECUTE,
            &[
                ("request", self.request.as_str()),
                ("topic", step.topic.as_str()),
                ("query", step.query_text.as_str()),
                ("limit", &limit),
            ],
        );
        let content = self
            .llm
            .complete(&[ChatMessage::user(&prompt)], &self.model, EXECUTE_TEMPERATURE)
            .await
            .with_context(|| format!("search for '{}' failed", step.query_text))?;
        let mut execution = parse_execution(&content, &step.topic)?;
        execution.pois.truncate(self.limit);
        tracing::debug!(
            topic = %step.topic,
            recall = execution.recall,
            matched = execution.pois.len(),
            quality = execution.quality,
            "step executed"
        );
        Ok(execution)
    }
}
