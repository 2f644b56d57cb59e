//! Anthropic Messages API engine.

use super::{CompletionRequest, ReasoningEngine};
use crate::error::{DbChatError, Result};
use crate::tools::ToolDescriptor;
use crate::transcript::{ContentItem, Turn};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Tool definition in Anthropic format.
#[derive(Debug, Clone, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

/// Message content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Thinking blocks and other types this client does not act on.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Reasoning engine backed by the Anthropic Messages API.
pub struct AnthropicEngine {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicEngine {
    /// Create an engine whose HTTP calls give up after `timeout`.
    pub fn new(model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the engine at a different API root (proxies, gateways).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_request<'a>(&'a self, request: &CompletionRequest<'a>) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: request.max_output_tokens,
            system: Some(request.system_instructions).filter(|s| !s.is_empty()),
            messages: to_messages(request.transcript),
            tools: to_tools(request.tools),
        }
    }
}

#[async_trait]
impl ReasoningEngine for AnthropicEngine {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ContentItem>> {
        let body = self.build_request(&request);
        debug!("Sending {} messages to Anthropic", body.messages.len());

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DbChatError::ModelService(format!("Anthropic request timed out: {}", e))
                } else {
                    DbChatError::ModelService(format!("Network error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DbChatError::ModelService(format!("Failed to parse response: {}", e)))?;

        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            warn!("Model output was cut off at max_tokens");
        }

        from_blocks(parsed.content)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

fn to_tools(tools: &[ToolDescriptor]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
        })
        .collect()
}

/// Convert the transcript to alternating messages.
fn to_messages(transcript: &[Turn]) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();

    for turn in transcript {
        let (role, content) = match turn {
            Turn::UserText { text } => ("user", vec![ContentBlock::Text { text: text.clone() }]),
            Turn::AssistantContent { items } => {
                let blocks: Vec<ContentBlock> = items
                    .iter()
                    .filter_map(|item| match item {
                        ContentItem::Text { text } if text.is_empty() => None,
                        ContentItem::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
                        ContentItem::ToolInvocation(request) => Some(ContentBlock::ToolUse {
                            id: request.id.clone(),
                            name: request.tool_name.clone(),
                            input: Value::Object(request.arguments.clone()),
                        }),
                    })
                    .collect();
                ("assistant", blocks)
            }
            Turn::ToolResultBatch { results } => {
                let blocks: Vec<ContentBlock> = results
                    .iter()
                    .map(|result| ContentBlock::ToolResult {
                        tool_use_id: result.request_id.clone(),
                        content: result.content_text.clone(),
                        is_error: result.is_error,
                    })
                    .collect();
                ("user", blocks)
            }
        };

        if content.is_empty() {
            continue;
        }

        // The API requires alternating roles
        if let Some(last) = messages.last_mut() {
            if last.role == role {
                last.content.extend(content);
                continue;
            }
        }
        messages.push(Message { role, content });
    }

    messages
}

fn from_blocks(blocks: Vec<ContentBlock>) -> Result<Vec<ContentItem>> {
    let mut items = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            ContentBlock::Text { text } => items.push(ContentItem::Text { text }),
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = match input {
                    Value::Object(map) => map,
                    Value::Null => Default::default(),
                    other => {
                        return Err(DbChatError::ModelService(format!(
                            "tool_use '{}' has non-object input: {}",
                            id, other
                        )))
                    }
                };
                items.push(ContentItem::tool_invocation(id, name, arguments));
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {
                debug!("Skipping unsupported content block");
            }
        }
    }
    Ok(items)
}

fn classify_error(status: StatusCode, body: &str) -> DbChatError {
    let (kind, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.kind, envelope.error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || kind == "rate_limit_error" {
        DbChatError::ModelQuotaExceeded(message)
    } else {
        DbChatError::ModelService(format!("Anthropic API error ({}): {}", status, message))
    }
}
