//! Response generation.
//!
//! The pipeline treats generation as opaque: reply text in, response text
//! out. `LlmResponder` is the production implementation backed by Ollama or
//! any OpenAI-compatible chat endpoint.

mod config;
mod prompts;
mod responder;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use config::{LlmConfig, LlmProvider};
pub use responder::LlmResponder;

/// Errors that can occur while generating a response.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Failed to reach the LLM service.
    #[error("connection error: {0}")]
    Connection(String),
    /// The service answered with an error.
    #[error("API error: {0}")]
    Api(String),
    /// The answer could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
    /// Nothing usable left after cleanup.
    #[error("empty response")]
    Empty,
    /// Generation exceeded its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Produces the text we post in answer to a reply.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, reply_text: &str) -> Result<String, GenerationError>;
}
