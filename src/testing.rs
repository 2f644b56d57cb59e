//! Test doubles for the tool server and the reasoning engine.

use crate::engine::{CompletionRequest, ReasoningEngine};
use crate::error::{DbChatError, Result};
use crate::mcp::ToolCallResult;
use crate::tools::{ListedTool, ToolServer};
use crate::transcript::{ContentItem, Turn};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// How a fake tool answers.
#[derive(Debug, Clone)]
pub enum ToolBehavior {
    Text(String),
    Result(ToolCallResult),
    Delayed(Duration, String),
    Fail(String),
}

/// In-process tool server with scripted tools.
pub struct FakeToolServer {
    listing: Vec<ListedTool>,
    behaviors: HashMap<String, ToolBehavior>,
    unavailable: bool,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl FakeToolServer {
    pub fn new(listing: Vec<ListedTool>) -> Self {
        Self {
            listing,
            behaviors: HashMap::new(),
            unavailable: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Server offering `query_data`, answering every query with `(1)`.
    pub fn sql() -> Self {
        Self::new(Vec::new()).with_tool("query_data", ToolBehavior::Text("(1)".into()))
    }

    /// Server whose every call fails as unreachable.
    pub fn unavailable() -> Self {
        let mut server = Self::new(Vec::new());
        server.unavailable = true;
        server
    }

    pub fn with_tool(mut self, name: &str, behavior: ToolBehavior) -> Self {
        if !self.listing.iter().any(|t| t.name.as_deref() == Some(name)) {
            self.listing.push(ListedTool {
                name: Some(name.to_string()),
                description: Some(format!("{} tool", name)),
                input_schema: Some(json!({"type": "object", "properties": {}})),
            });
        }
        self.behaviors.insert(name.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl ToolServer for FakeToolServer {
    async fn list_tools(&self) -> Result<Vec<ListedTool>> {
        if self.unavailable {
            return Err(DbChatError::ToolServerUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(self.listing.clone())
    }

    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolCallResult> {
        if self.unavailable {
            return Err(DbChatError::ToolServerUnavailable(
                "connection refused".to_string(),
            ));
        }
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));

        match self.behaviors.get(name) {
            Some(ToolBehavior::Text(text)) => Ok(ToolCallResult::text(text.clone())),
            Some(ToolBehavior::Result(result)) => Ok(result.clone()),
            Some(ToolBehavior::Delayed(delay, text)) => {
                tokio::time::sleep(*delay).await;
                Ok(ToolCallResult::text(text.clone()))
            }
            Some(ToolBehavior::Fail(message)) => {
                Err(DbChatError::ToolServerProtocol(message.clone()))
            }
            None => Err(DbChatError::ToolServerProtocol(format!(
                "Unknown tool: {}",
                name
            ))),
        }
    }
}

/// What the engine was asked in one round.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub transcript: Vec<Turn>,
    pub tool_names: Vec<String>,
    pub system_instructions: String,
    pub max_output_tokens: u32,
}

/// Reasoning engine replaying canned rounds.
pub struct ScriptedEngine {
    rounds: Mutex<VecDeque<Result<Vec<ContentItem>>>>,
    repeat: Option<Vec<ContentItem>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedEngine {
    pub fn new(rounds: Vec<Result<Vec<ContentItem>>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Engine answering every round with the same items.
    pub fn looping(items: Vec<ContentItem>) -> Self {
        Self {
            rounds: Mutex::new(VecDeque::new()),
            repeat: Some(items),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ContentItem>> {
        self.requests.lock().unwrap().push(RecordedRequest {
            transcript: request.transcript.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            system_instructions: request.system_instructions.to_string(),
            max_output_tokens: request.max_output_tokens,
        });

        if let Some(items) = &self.repeat {
            return Ok(items.clone());
        }
        self.rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DbChatError::ModelService("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
