//! Agent runner with tool calling loop.

use crate::engine::{CompletionRequest, ReasoningEngine};
use crate::error::{DbChatError, Result};
use crate::tools::{fetch_catalog, ToolDispatcher};
use crate::transcript::{ContentItem, ToolInvocationRequest, ToolResult, Transcript, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default system prompt for the agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a master SQLite assistant. \
Your job is to use the tools at your disposal to execute SQL queries and provide the results to the user.";

/// Default output token budget per model round.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8000;

/// Default number of model rounds per run.
pub const DEFAULT_MAX_ROUNDS: usize = 15;

/// Where a run currently stands.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    AwaitingToolResults(Vec<ToolInvocationRequest>),
    Done,
}

/// Agent that answers questions by letting the model call tools.
pub struct Agent {
    engine: Arc<dyn ReasoningEngine>,
    dispatcher: ToolDispatcher,
    system_prompt: String,
    max_output_tokens: u32,
    max_rounds: usize,
}

impl Agent {
    /// Create a new agent from an engine and a dispatcher bound to a tool server session.
    pub fn new(engine: Arc<dyn ReasoningEngine>, dispatcher: ToolDispatcher) -> Self {
        Self {
            engine,
            dispatcher,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set the output token budget per model round.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Set maximum model rounds per run.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Run the agent on a fresh transcript.
    pub async fn run(&self, query: &str) -> Result<AgentResponse> {
        let mut transcript = Transcript::new();
        self.run_with(&mut transcript, query).await
    }

    /// Run the agent, continuing an existing transcript.
    ///
    /// On error the transcript may hold a partial run; callers that keep a
    /// conversation going should run on a copy and keep it only on success.
    #[instrument(
        skip_all,
        fields(run_id = %uuid::Uuid::new_v4(), engine = self.engine.name())
    )]
    pub async fn run_with(&self, transcript: &mut Transcript, query: &str) -> Result<AgentResponse> {
        transcript.append(Turn::UserText {
            text: query.to_string(),
        })?;

        let catalog = fetch_catalog(self.dispatcher.server().as_ref()).await?;
        info!("Tool catalog has {} tools", catalog.len());

        let mut final_answer = String::new();
        let mut tool_calls = Vec::new();
        let mut rounds = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if rounds >= self.max_rounds {
                        warn!("Round budget of {} exhausted", self.max_rounds);
                        return Err(DbChatError::RoundBudgetExceeded(self.max_rounds));
                    }
                    rounds += 1;
                    debug!("Agent round {}", rounds);

                    let items = self
                        .engine
                        .complete(CompletionRequest {
                            transcript: transcript.snapshot(),
                            tools: &catalog,
                            system_instructions: &self.system_prompt,
                            max_output_tokens: self.max_output_tokens,
                        })
                        .await?;

                    let mut requests = Vec::new();
                    for item in &items {
                        match item {
                            ContentItem::Text { text } => {
                                final_answer.push_str(text);
                                final_answer.push('\n');
                            }
                            ContentItem::ToolInvocation(request) => requests.push(request.clone()),
                        }
                    }
                    transcript.append(Turn::AssistantContent { items })?;

                    if requests.is_empty() {
                        LoopState::Done
                    } else {
                        LoopState::AwaitingToolResults(requests)
                    }
                }
                LoopState::AwaitingToolResults(requests) => {
                    let results = self.dispatcher.execute_all(&requests).await;
                    tool_calls.extend(
                        requests
                            .iter()
                            .zip(&results)
                            .map(|(request, result)| ToolCallRecord::new(request, result)),
                    );
                    transcript.append(Turn::ToolResultBatch { results })?;
                    LoopState::AwaitingModel
                }
                LoopState::Done => {
                    info!(
                        "Agent finished after {} rounds and {} tool calls",
                        rounds,
                        tool_calls.len()
                    );
                    return Ok(AgentResponse {
                        answer: final_answer.trim().to_string(),
                        rounds,
                        tool_calls,
                    });
                }
            };
        }
    }

    /// Answer a user message. Never fails: hard failures are reported in the response text.
    pub async fn answer(&self, user_text: &str) -> ChatResponse {
        match self.run(user_text).await {
            Ok(response) => ChatResponse {
                response: response.answer,
            },
            Err(e) => {
                warn!("Run failed: {}", e);
                ChatResponse::error(&e)
            }
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// Text fragments of every round, newline-joined and trimmed.
    pub answer: String,
    /// Number of rounds (model calls) used.
    pub rounds: usize,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// What callers of [`Agent::answer`] receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

impl ChatResponse {
    /// Response carrying a failure description.
    pub fn error(cause: impl std::fmt::Display) -> Self {
        Self {
            response: format!("Error: {}", cause),
        }
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
    pub is_error: bool,
}

impl ToolCallRecord {
    fn new(request: &ToolInvocationRequest, result: &ToolResult) -> Self {
        Self {
            name: request.tool_name.clone(),
            arguments: serde_json::Value::Object(request.arguments.clone()).to_string(),
            result: result.content_text.clone(),
            is_error: result.is_error,
        }
    }
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
