//! LLM-backed implementations of the POI-Scout capabilities.
//!
//! Everything here sits behind the traits in `poiscout_core::capability`.
//! Model output is parsed strictly in [`parse`]; the engine never sees raw
//! model text.

pub mod embedder;
pub mod error;
pub mod executor;
pub mod llm;
pub mod parse;
pub mod planner;
pub mod prompts;
pub mod questions;
pub mod reflector;
pub mod summarizer;

use std::sync::Arc;

use poiscout_core::capability::{Embedder, Executor, Planner, QuestionGenerator, Reflector, Summarizer};
use poiscout_core::config::{EmbeddingConfig, LlmConfig};

pub use embedder::HttpEmbedder;
pub use error::AgentError;
pub use executor::LlmExecutor;
pub use llm::{ChatLlm, ChatMessage, LlmClient};
pub use planner::LlmPlanner;
pub use questions::LlmQuestionGenerator;
pub use reflector::LlmReflector;
pub use summarizer::LlmSummarizer;

/// Concurrent per-POI classification calls for one question.
const CLASSIFY_CONCURRENCY: usize = 8;

/// One shared HTTP client, with each capability bound to its configured model.
pub struct LlmCapabilities {
    client: Arc<LlmClient>,
    config: LlmConfig,
    pub planner: Arc<dyn Planner>,
    pub reflector: Arc<dyn Reflector>,
    pub summarizer: Arc<dyn Summarizer>,
    pub embedder: Arc<dyn Embedder>,
    pub questions: Arc<dyn QuestionGenerator>,
}

impl LlmCapabilities {
    pub fn new(config: &LlmConfig, embedding: &EmbeddingConfig) -> Result<Self, AgentError> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey);
        }
        let client = Arc::new(LlmClient::new(&config.api_base, &config.api_key)?);
        let chat: Arc<dyn ChatLlm> = client.clone();
        tracing::debug!(api_base = %client.api_base(), model = %config.model, "LLM capabilities configured");
        Ok(Self {
            planner: Arc::new(LlmPlanner::new(chat.clone(), &config.planner_model)),
            reflector: Arc::new(LlmReflector::new(chat.clone(), &config.reflection_model)),
            summarizer: Arc::new(LlmSummarizer::new(chat.clone(), &config.reflection_model)),
            embedder: Arc::new(HttpEmbedder::new(client.clone(), embedding)),
            questions: Arc::new(LlmQuestionGenerator::new(
                chat,
                &config.model,
                &config.small_model,
                CLASSIFY_CONCURRENCY,
            )),
            client,
            config: config.clone(),
        })
    }

    /// Executor stand-in scoped to one request.
    pub fn executor_for(&self, request: &str) -> Arc<dyn Executor> {
        let chat: Arc<dyn ChatLlm> = self.client.clone();
        Arc::new(LlmExecutor::new(chat, &self.config.small_model, request))
    }
}
