//! Conversation transcript for one orchestration run.
//!
//! The transcript is the only context the model sees: every user query,
//! every model round and every batch of tool results is appended here in
//! order and never removed.

use crate::error::{DbChatError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One item of model output for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Natural-language fragment, accumulated into the final answer.
    Text { text: String },
    /// A tool the model wants executed.
    ToolInvocation(ToolInvocationRequest),
}

impl ContentItem {
    /// Create a text item.
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    /// Create a tool invocation item.
    pub fn tool_invocation(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        ContentItem::ToolInvocation(ToolInvocationRequest {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        })
    }
}

/// A request, issued by the model, to execute one named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Opaque id, unique within the round; correlates the result.
    pub id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// Textual result of executing one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the invocation this result answers.
    pub request_id: String,
    pub content_text: String,
    /// True when `content_text` carries an error report.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result.
    pub fn success(request_id: impl Into<String>, content_text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            content_text: content_text.into(),
            is_error: false,
        }
    }

    /// Failed invocation, reported to the model as `Error: <cause>`.
    pub fn failure(request_id: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self {
            request_id: request_id.into(),
            content_text: format!("Error: {}", cause),
            is_error: true,
        }
    }
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Raw user query.
    UserText { text: String },
    /// Model output for one round.
    AssistantContent { items: Vec<ContentItem> },
    /// Results for every tool call of the preceding assistant turn.
    ToolResultBatch { results: Vec<ToolResult> },
}

impl Turn {
    /// Tool invocations requested by an assistant turn, in order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocationRequest> {
        let items: &[ContentItem] = match self {
            Turn::AssistantContent { items } => items,
            _ => &[],
        };
        items.iter().filter_map(|item| match item {
            ContentItem::ToolInvocation(request) => Some(request),
            ContentItem::Text { .. } => None,
        })
    }

    /// Check structural well-formedness.
    fn validate(&self) -> Result<()> {
        match self {
            Turn::UserText { text } => {
                if text.trim().is_empty() {
                    return Err(DbChatError::InvalidTurn("user text is empty".to_string()));
                }
            }
            Turn::AssistantContent { .. } => {
                let mut seen = HashSet::new();
                for request in self.tool_invocations() {
                    if request.id.is_empty() {
                        return Err(DbChatError::InvalidTurn(
                            "tool invocation has an empty id".to_string(),
                        ));
                    }
                    if request.tool_name.is_empty() {
                        return Err(DbChatError::InvalidTurn(format!(
                            "tool invocation '{}' has an empty tool name",
                            request.id
                        )));
                    }
                    if !seen.insert(request.id.as_str()) {
                        return Err(DbChatError::InvalidTurn(format!(
                            "duplicate tool invocation id '{}'",
                            request.id
                        )));
                    }
                }
            }
            Turn::ToolResultBatch { results } => {
                if results.is_empty() {
                    return Err(DbChatError::InvalidTurn(
                        "tool result batch is empty".to_string(),
                    ));
                }
                let mut seen = HashSet::new();
                for result in results {
                    if result.request_id.is_empty() {
                        return Err(DbChatError::InvalidTurn(
                            "tool result has an empty request id".to_string(),
                        ));
                    }
                    if !seen.insert(result.request_id.as_str()) {
                        return Err(DbChatError::InvalidTurn(format!(
                            "duplicate tool result for request '{}'",
                            result.request_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Append-only, ordered log of turns.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn after checking it is well-formed.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        turn.validate()?;
        self.turns.push(turn);
        Ok(())
    }

    /// Full ordered history.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_snapshot_preserves_append_order() {
        let mut transcript = Transcript::new();
        let turns = vec![
            Turn::UserText {
                text: "count rows in orders".to_string(),
            },
            Turn::AssistantContent {
                items: vec![
                    ContentItem::text("Let me check."),
                    ContentItem::tool_invocation(
                        "t1",
                        "query_data",
                        args(json!({"sql": "SELECT COUNT(*) FROM orders"})),
                    ),
                ],
            },
            Turn::ToolResultBatch {
                results: vec![ToolResult::success("t1", "42")],
            },
            Turn::AssistantContent {
                items: vec![ContentItem::text("There are 42 orders.")],
            },
        ];

        for turn in turns.clone() {
            transcript.append(turn).unwrap();
        }

        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.snapshot(), turns.as_slice());
    }

    #[test]
    fn test_alternation_is_not_enforced() {
        let mut transcript = Transcript::new();
        transcript
            .append(Turn::UserText { text: "a".to_string() })
            .unwrap();
        transcript
            .append(Turn::UserText { text: "b".to_string() })
            .unwrap();
        transcript
            .append(Turn::AssistantContent { items: vec![] })
            .unwrap();
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_rejects_blank_user_text() {
        let mut transcript = Transcript::new();
        let err = transcript
            .append(Turn::UserText {
                text: "   ".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DbChatError::InvalidTurn(_)));
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_invocation_ids() {
        let mut transcript = Transcript::new();
        let err = transcript
            .append(Turn::AssistantContent {
                items: vec![
                    ContentItem::tool_invocation("t1", "query_data", Map::new()),
                    ContentItem::tool_invocation("t1", "list_tables", Map::new()),
                ],
            })
            .unwrap_err();
        assert!(matches!(err, DbChatError::InvalidTurn(_)));
    }

    #[test]
    fn test_rejects_empty_tool_name() {
        let mut transcript = Transcript::new();
        let err = transcript
            .append(Turn::AssistantContent {
                items: vec![ContentItem::tool_invocation("t1", "", Map::new())],
            })
            .unwrap_err();
        assert!(matches!(err, DbChatError::InvalidTurn(_)));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_result_batches() {
        let mut transcript = Transcript::new();
        assert!(transcript
            .append(Turn::ToolResultBatch { results: vec![] })
            .is_err());
        assert!(transcript
            .append(Turn::ToolResultBatch {
                results: vec![ToolResult::success("t1", "a"), ToolResult::success("t1", "b")],
            })
            .is_err());
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_tool_invocations_in_order() {
        let turn = Turn::AssistantContent {
            items: vec![
                ContentItem::tool_invocation("a", "one", Map::new()),
                ContentItem::text("between"),
                ContentItem::tool_invocation("b", "two", Map::new()),
            ],
        };
        let ids: Vec<_> = turn.tool_invocations().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_failure_result_text() {
        let result = ToolResult::failure("t9", "unknown tool: drop_everything");
        assert_eq!(result.content_text, "Error: unknown tool: drop_everything");
        assert!(result.is_error);
    }
}
