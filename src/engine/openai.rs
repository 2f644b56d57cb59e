//! OpenAI Chat Completions engine.

use super::{CompletionRequest, ReasoningEngine};
use crate::error::{DbChatError, Result};
use crate::tools::ToolDescriptor;
use crate::transcript::{ContentItem, Turn};
use async_openai::config::OpenAIConfig;
use async_openai::error::{ApiError, OpenAIError};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseMessage, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Reasoning engine backed by OpenAI function calling.
pub struct OpenAiEngine {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEngine {
    /// Create an engine whose HTTP calls give up after `timeout`.
    pub fn new(model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Self::with_config(model, OpenAIConfig::new().with_api_key(api_key), timeout)
    }

    /// Create an engine against a custom API base (Azure proxies, local gateways).
    pub fn with_base_url(model: &str, api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self::with_config(model, config, timeout)
    }

    fn with_config(model: &str, config: OpenAIConfig, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        // Rate limits surface as ModelQuotaExceeded instead of being retried
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Ok(Self {
            client: Client::with_config(config)
                .with_http_client(http_client)
                .with_backoff(no_retry),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ContentItem>> {
        let messages = to_messages(request.system_instructions, request.transcript)?;
        debug!("Sending {} messages to OpenAI", messages.len());

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(request.max_output_tokens);
        if !request.tools.is_empty() {
            args.tools(tool_definitions(request.tools));
        }
        let chat_request = args.build().map_err(build_error)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(classify_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DbChatError::ModelService("No response from model".to_string()))?;

        from_message(choice.message)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Convert catalog entries to OpenAI function/tool definitions.
fn tool_definitions(tools: &[ToolDescriptor]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.input_schema.clone()),
                strict: None,
            },
        })
        .collect()
}

fn to_messages(system: &str, transcript: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

    if !system.is_empty() {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(build_error)?
                .into(),
        );
    }

    for turn in transcript {
        match turn {
            Turn::UserText { text } => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text.as_str())
                    .build()
                    .map_err(build_error)?
                    .into(),
            ),
            Turn::AssistantContent { items } => {
                let text = items
                    .iter()
                    .filter_map(|item| match item {
                        ContentItem::Text { text } => Some(text.as_str()),
                        ContentItem::ToolInvocation(_) => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let tool_calls: Vec<ChatCompletionMessageToolCall> = turn
                    .tool_invocations()
                    .map(|request| ChatCompletionMessageToolCall {
                        id: request.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: request.tool_name.clone(),
                            arguments: Value::Object(request.arguments.clone()).to_string(),
                        },
                    })
                    .collect();

                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    builder.content(text);
                }
                if !tool_calls.is_empty() {
                    builder.tool_calls(tool_calls);
                }
                messages.push(builder.build().map_err(build_error)?.into());
            }
            Turn::ToolResultBatch { results } => {
                for result in results {
                    messages.push(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(result.request_id.as_str())
                            .content(result.content_text.as_str())
                            .build()
                            .map_err(build_error)?
                            .into(),
                    );
                }
            }
        }
    }

    Ok(messages)
}

/// Text first, then the tool calls in the order the service listed them.
fn from_message(message: ChatCompletionResponseMessage) -> Result<Vec<ContentItem>> {
    let mut items = Vec::new();

    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        items.push(ContentItem::Text { text });
    }

    for call in message.tool_calls.unwrap_or_default() {
        let arguments: Map<String, Value> = if call.function.arguments.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                DbChatError::ModelService(format!(
                    "Invalid arguments for tool call {}: {}",
                    call.id, e
                ))
            })?
        };
        items.push(ContentItem::tool_invocation(call.id, call.function.name, arguments));
    }

    Ok(items)
}

fn build_error(e: OpenAIError) -> DbChatError {
    DbChatError::ModelService(format!("Failed to build request: {}", e))
}

fn classify_error(e: OpenAIError) -> DbChatError {
    match e {
        OpenAIError::ApiError(api) if is_quota_error(&api) => {
            DbChatError::ModelQuotaExceeded(api.message)
        }
        other => DbChatError::ModelService(format!("OpenAI API error: {}", other)),
    }
}

fn is_quota_error(api: &ApiError) -> bool {
    api.r#type.as_deref() == Some("insufficient_quota")
        || matches!(
            api.code.as_deref(),
            Some("rate_limit_exceeded" | "insufficient_quota")
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::ToolResult;
    use serde_json::json;

    #[test]
    fn test_to_messages_expands_tool_results() {
        let transcript = vec![
            Turn::UserText {
                text: "which tables exist?".to_string(),
            },
            Turn::AssistantContent {
                items: vec![
                    ContentItem::tool_invocation("call_1", "list_tables", Map::new()),
                    ContentItem::tool_invocation("call_2", "list_tables", Map::new()),
                ],
            },
            Turn::ToolResultBatch {
                results: vec![
                    ToolResult::success("call_1", "orders"),
                    ToolResult::success("call_2", "orders"),
                ],
            },
        ];

        let messages = to_messages("You are a master SQLite assistant.", &transcript).unwrap();
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::Tool(_)));
        assert!(matches!(messages[4], ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_from_message_text_then_tool_calls() {
        let message: ChatCompletionResponseMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": "Checking the orders table.",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "query_data", "arguments": "{\"sql\":\"SELECT COUNT(*) FROM orders\"}"}
            }]
        }))
        .unwrap();

        let items = from_message(message).unwrap();
        assert_eq!(items[0], ContentItem::text("Checking the orders table."));
        match &items[1] {
            ContentItem::ToolInvocation(request) => {
                assert_eq!(request.id, "call_1");
                assert_eq!(request.tool_name, "query_data");
                assert_eq!(request.arguments["sql"], json!("SELECT COUNT(*) FROM orders"));
            }
            other => panic!("Expected tool invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_from_message_rejects_invalid_arguments() {
        let message: ChatCompletionResponseMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "query_data", "arguments": "{not json"}
            }]
        }))
        .unwrap();

        assert!(matches!(
            from_message(message).unwrap_err(),
            DbChatError::ModelService(_)
        ));
    }

    fn api_error(r#type: Option<&str>, code: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: "limit reached".to_string(),
            r#type: r#type.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_classify_quota_errors() {
        assert!(matches!(
            classify_error(api_error(Some("insufficient_quota"), None)),
            DbChatError::ModelQuotaExceeded(m) if m == "limit reached"
        ));
        assert!(matches!(
            classify_error(api_error(Some("requests"), Some("rate_limit_exceeded"))),
            DbChatError::ModelQuotaExceeded(_)
        ));
        assert!(matches!(
            classify_error(api_error(
                Some("invalid_request_error"),
                Some("invalid_api_key")
            )),
            DbChatError::ModelService(_)
        ));
    }

    fn request_parts() -> (Vec<Turn>, Vec<ToolDescriptor>) {
        (
            vec![Turn::UserText {
                text: "how many orders?".to_string(),
            }],
            vec![ToolDescriptor {
                name: "query_data".to_string(),
                description: "Executes raw SQL".to_string(),
                input_schema: json!({"type": "object"}),
            }],
        )
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error": {"message": "Rate limit reached", "type": "requests", "param": null, "code": "rate_limit_exceeded"}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let engine = OpenAiEngine::with_base_url(
            "gpt-4o",
            "test-key",
            &format!("{}/v1", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let (transcript, tools) = request_parts();
        let result = engine
            .complete(CompletionRequest {
                transcript: &transcript,
                tools: &tools,
                system_instructions: "",
                max_output_tokens: 100,
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            DbChatError::ModelQuotaExceeded(m) if m.contains("Rate limit")
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "param": null, "code": "invalid_api_key"}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let engine = OpenAiEngine::with_base_url(
            "gpt-4o",
            "bad-key",
            &format!("{}/v1", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let (transcript, tools) = request_parts();
        let result = engine
            .complete(CompletionRequest {
                transcript: &transcript,
                tools: &tools,
                system_instructions: "You are a master SQLite assistant.",
                max_output_tokens: 100,
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            DbChatError::ModelService(m) if m.contains("Incorrect API key")
        ));
        mock.assert_async().await;
    }

    #[test]
    fn test_tool_definitions_carry_schema() {
        let tools = vec![ToolDescriptor {
            name: "query_data".to_string(),
            description: "Executes raw SQL".to_string(),
            input_schema: json!({"type": "object", "required": ["sql"]}),
        }];
        let defs = tool_definitions(&tools);
        assert_eq!(defs[0].function.name, "query_data");
        assert_eq!(
            defs[0].function.parameters,
            Some(json!({"type": "object", "required": ["sql"]}))
        );
    }
}
