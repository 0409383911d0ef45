//! Errors raised while wiring the LLM-backed capabilities.
//!
//! Failures of individual capability calls are `anyhow` errors; the engine
//! wraps them into `CapabilityError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("no API key configured (set POISCOUT_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,
}
