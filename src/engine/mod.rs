//! Reasoning engine clients.
//!
//! A reasoning engine receives the transcript and the tool catalog and
//! returns one round of model output: text fragments and tool invocation
//! requests, in the order the service produced them.

mod anthropic;
mod openai;

pub use anthropic::AnthropicEngine;
pub use openai::OpenAiEngine;

use crate::error::Result;
use crate::tools::ToolDescriptor;
use crate::transcript::{ContentItem, Turn};
use async_trait::async_trait;

/// Everything the model needs for one round.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub transcript: &'a [Turn],
    pub tools: &'a [ToolDescriptor],
    pub system_instructions: &'a str,
    pub max_output_tokens: u32,
}

/// Trait for LLM services with tool use.
///
/// Implementations surface transport and authentication failures as
/// `ModelService` and rate or usage limits as `ModelQuotaExceeded`. They
/// never retry.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Run one model round.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ContentItem>>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}
