//! MCP (Model Context Protocol) plumbing.
//!
//! [`McpClient`] speaks to a tool server process over stdio through `rmcp`;
//! [`McpServer`] is the SQLite tool server the client launches by default,
//! serving JSON-RPC 2.0 over newline-delimited stdio.

mod client;
mod protocol;
mod server;
mod tools;

pub use client::McpClient;
pub use protocol::{ToolCallResult, ToolContent, PROTOCOL_VERSION};
pub use server::McpServer;
