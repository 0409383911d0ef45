//! Question generation for the decision tree.
//!
//! Two stages: the large model drafts an A/B question for the whole subset,
//! then the small model places each POI under A, B, or neither. The
//! resulting partition is what the tree builder scores.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use poiscout_core::capability::{QaRecord, QuestionCandidate, QuestionGenerator};
use poiscout_core::Poi;

use crate::llm::{retry_temperature, ChatLlm, ChatMessage};
use crate::parse::{parse_fit, parse_question, Fit, QuestionText};
use crate::prompts;

/// Each further candidate for the same node is drawn hotter.
const BASE_TEMPERATURE: f64 = 0.7;
const CLASSIFY_TEMPERATURE: f64 = 0.0;

pub struct LlmQuestionGenerator {
    llm: Arc<dyn ChatLlm>,
    model: String,
    small_model: String,
    concurrency: usize,
}

impl LlmQuestionGenerator {
    pub fn new(
        llm: Arc<dyn ChatLlm>,
        model: impl Into<String>,
        small_model: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            small_model: small_model.into(),
            concurrency: concurrency.max(1),
        }
    }

    async fn classify(
        &self,
        request: &str,
        history: &str,
        question: &QuestionText,
        poi: &Poi,
    ) -> Fit {
        let poi_text = poi.describe();
        let prompt = prompts::render(
            prompts::CLASSIFY,
            &[
                ("request", request),
                ("history", history),
                ("question", question.question.as_str()),
                ("option_a", question.option_a.as_str()),
                ("option_b", question.option_b.as_str()),
                ("poi", &poi_text),
            ],
        );
        let result = self
            .llm
            .complete(&[ChatMessage::user(&prompt)], &self.small_model, CLASSIFY_TEMPERATURE)
            .await
            .and_then(|content| parse_fit(&content));
        match result {
            Ok(fit) => fit,
            Err(e) => {
                tracing::warn!(poi = %poi.id, "POI classification failed, keeping it in both branches: {:#}", e);
                Fit::Either
            }
        }
    }
}

pub(crate) fn render_history(history: &[QaRecord]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} -> {}", i + 1, r.question, r.chosen_option))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_pois(subset: &[Poi]) -> String {
    subset
        .iter()
        .map(|p| format!("- {}", p.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate_question(
        &self,
        request: &str,
        subset: &[Poi],
        history: &[QaRecord],
        attempt: usize,
    ) -> Result<QuestionCandidate> {
        let history_text = render_history(history);
        let count = subset.len().to_string();
        let pois_text = render_pois(subset);
        let prompt = prompts::render(
            prompts::QUESTION,
            &[
                ("request", request),
                ("history", &history_text),
                ("count", &count),
                ("pois", &pois_text),
            ],
        );
        let temperature = retry_temperature(BASE_TEMPERATURE, attempt);
        let content = self
            .llm
            .complete(&[ChatMessage::user(&prompt)], &self.model, temperature)
            .await
            .context("question generation failed")?;
        let question = parse_question(&content)?;

        let classifications: Vec<_> = subset
            .iter()
            .map(|poi| self.classify(request, &history_text, &question, poi))
            .collect();
        let fits: Vec<Fit> = stream::iter(classifications)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut branch_a = Vec::new();
        let mut branch_b = Vec::new();
        for (poi, fit) in subset.iter().zip(fits) {
            match fit {
                Fit::A => branch_a.push(poi.id.clone()),
                Fit::B => branch_b.push(poi.id.clone()),
                Fit::Either => {}
            }
        }
        tracing::debug!(
            attempt,
            n = subset.len(),
            a = branch_a.len(),
            b = branch_b.len(),
            question = %question.question,
            "question candidate"
        );
        Ok(QuestionCandidate {
            question: question.question,
            option_a: question.option_a,
            option_b: question.option_b,
            branch_a,
            branch_b,
        })
    }
}
