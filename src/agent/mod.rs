//! Orchestration loop.
//!
//! The agent alternates between the reasoning engine and the tool server
//! until the model answers without requesting tools, folding every tool
//! result back into the transcript.

mod runner;

pub use runner::{
    Agent, AgentResponse, ChatResponse, ToolCallRecord, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_MAX_ROUNDS, DEFAULT_SYSTEM_PROMPT,
};
