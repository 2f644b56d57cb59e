//! Tools command: show the catalog the model will see.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::mcp::McpClient;
use crate::orchestrator::tool_server_command;
use crate::tools::fetch_catalog;
use anyhow::Result;

/// Run the tools command.
pub async fn run_tools(settings: Settings) -> Result<()> {
    preflight::check(Operation::Tools, &settings)?;

    let (command, args) = tool_server_command(&settings)?;
    let client =
        McpClient::spawn(&command, &args, settings.tool_server.handshake_timeout()).await?;
    let catalog = fetch_catalog(&client).await;
    client.shutdown().await;
    let catalog = catalog?;

    Output::header(&format!("Tools ({})", catalog.len()));
    for tool in &catalog {
        Output::list_item(&tool.name);
        if !tool.description.is_empty() {
            Output::kv("description", &tool.description);
        }
        Output::kv("input", &tool.input_schema.to_string());
    }
    println!();

    Ok(())
}
