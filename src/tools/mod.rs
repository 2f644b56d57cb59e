//! Tool server abstraction.
//!
//! The orchestration loop sees the tool server only through [`ToolServer`]:
//! it lists the catalog once per run and calls tools one at a time.

mod dispatcher;
mod registry;

pub use dispatcher::ToolDispatcher;
pub use registry::{fetch_catalog, ToolDescriptor};

use crate::error::Result;
use crate::mcp::ToolCallResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A tool entry as listed by the server, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedTool {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

/// Trait for tool server sessions.
///
/// Implementations must serialise concurrent callers themselves; a session
/// may be shared by several orchestration runs.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// List every tool the server offers, in server order.
    async fn list_tools(&self) -> Result<Vec<ListedTool>>;

    /// Invoke one tool with structured arguments.
    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>)
        -> Result<ToolCallResult>;
}
