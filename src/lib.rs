//! dbchat - natural-language questions over a SQLite database
//!
//! An LLM answers questions by calling database tools exposed by a Model
//! Context Protocol (MCP) tool server, round after round, until it replies
//! without requesting tools.
//!
//! # Architecture
//!
//! - `transcript` - Ordered conversation history for one run
//! - `tools` - Tool server abstraction, catalog fetch and sequential dispatch
//! - `engine` - Reasoning engine clients (Anthropic, OpenAI)
//! - `agent` - The orchestration loop
//! - `orchestrator` - Composition root wiring engine and tool server
//! - `mcp` - MCP client and the built-in SQLite tool server
//! - `database` - SQLite access behind the tool server
//! - `config` - Configuration management
//! - `cli` - Command-line front-ends (ask, chat, serve, mcp)
//!
//! # Example
//!
//! ```rust,no_run
//! use dbchat::config::Settings;
//! use dbchat::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings).await?;
//!
//!     let reply = orchestrator.answer("How many orders were placed last week?").await;
//!     println!("{}", reply.response);
//!
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod orchestrator;
pub mod tools;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use error::{DbChatError, Result};
