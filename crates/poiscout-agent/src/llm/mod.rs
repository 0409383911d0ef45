//! LLM HTTP client for OpenAI-compatible APIs.
//!
//!   - `/chat/completions` for every text capability
//!   - `/embeddings` for skill, request and question vectors
//!
//! No tool calling and no streaming: every call is one request, one answer.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AgentError;


const REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Minimal chat message (no tool calls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Chat completion seam shared by every adapter.
///
/// [`LlmClient`] is the HTTP implementation; tests script their own.
#[async_trait]
pub trait ChatLlm: Send + Sync {
    /// Non-streaming chat completion. Returns the assistant's text content.
    async fn complete(&self, messages: &[ChatMessage], model: &str, temperature: f64) -> Result<String>;
}

const TEMPERATURE_STEP: f64 = 0.2;
const MAX_TEMPERATURE: f64 = 1.5;

/// Temperature for the `attempt`-th try of one call: each retry is sampled
/// hotter, capped at 1.5 (never below `base`).
pub(crate) fn retry_temperature(base: f64, attempt: usize) -> f64 {
    (base + attempt as f64 * TEMPERATURE_STEP).min(MAX_TEMPERATURE).max(base)
}

pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(api_base: &str, api_key: &str) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(AgentError::HttpClient)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: Option<f64>,
    ) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut body = json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if let Some(temp) = temperature {
            body["temperature"] = json!(temp);
        }

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("LLM API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({}): {}", status, body_text);
        }

        let response: ChatCompletionResponse = resp
            .json()
            .await
            .context("Failed to parse LLM API response")?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion"
            );
        }
        Ok(response)
    }

    /// Embed text(s) using the OpenAI-compatible /embeddings API.
    /// Returns one vector per input string, in input order.
    pub async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.api_base);
        let input: Value = if texts.len() == 1 {
            json!(texts[0])
        } else {
            json!(texts)
        };
        let body = json!({ "model": model, "input": input });
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Embedding API request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body_text);
        }
        let json: Value = resp.json().await.context("Failed to parse embedding response")?;
        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .context("Missing 'data' in embedding response")?;

        // Providers may return items out of order; `index` is authoritative when present.
        let mut items: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
        for (pos, item) in data.iter().enumerate() {
            let emb = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .context("Missing 'embedding' in embedding item")?;
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .map(|i| i as usize)
                .unwrap_or(pos);
            let vec: Vec<f32> = emb
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            items.push((index, vec));
        }
        items.sort_by_key(|(index, _)| *index);
        if items.len() != texts.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                items.len(),
                texts.len()
            );
        }
        Ok(items.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl ChatLlm for LlmClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str, temperature: f64) -> Result<String> {
        let response = self.chat_completion(model, messages, Some(temperature)).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("LLM response has no message content")?;
        Ok(content)
    }
}

// ─── Response types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}
