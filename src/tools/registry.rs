//! Tool catalog fetching and validation.

use super::{ListedTool, ToolServer};
use crate::error::{DbChatError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// One capability offered by the tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within a catalog.
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub input_schema: Value,
}

impl TryFrom<ListedTool> for ToolDescriptor {
    type Error = DbChatError;

    fn try_from(tool: ListedTool) -> Result<Self> {
        let name = tool
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DbChatError::MalformedCatalog("tool without a name".to_string()))?;

        let input_schema = tool
            .input_schema
            .filter(|s| !s.is_null())
            .ok_or_else(|| {
                DbChatError::MalformedCatalog(format!("tool '{}' has no input schema", name))
            })?;

        Ok(Self {
            name,
            description: tool.description.unwrap_or_default(),
            input_schema,
        })
    }
}

/// Query the tool server for its catalog.
///
/// Must be called once per run, before the first model call; the catalog is
/// never cached across runs.
#[instrument(skip_all)]
pub async fn fetch_catalog(server: &dyn ToolServer) -> Result<Vec<ToolDescriptor>> {
    let listed = server.list_tools().await?;

    let mut names = HashSet::new();
    let mut catalog = Vec::with_capacity(listed.len());
    for tool in listed {
        let descriptor = ToolDescriptor::try_from(tool)?;
        if !names.insert(descriptor.name.clone()) {
            return Err(DbChatError::MalformedCatalog(format!(
                "duplicate tool name '{}'",
                descriptor.name
            )));
        }
        catalog.push(descriptor);
    }

    debug!("Fetched {} tools", catalog.len());
    Ok(catalog)
}
