//! MCP command implementation.

use crate::cli::preflight::{self, Operation};
use crate::config::Settings;
use crate::database::SqliteDatabase;
use crate::mcp::McpServer;
use anyhow::Result;
use std::sync::Arc;

/// Run the MCP tool server on stdio.
///
/// Nothing may be printed to stdout here: it carries the JSON-RPC stream.
pub async fn run_mcp(database: Option<String>, read_only: bool, mut settings: Settings) -> Result<()> {
    if let Some(path) = database {
        settings.database.path = path;
    }
    settings.database.read_only |= read_only;

    preflight::check(Operation::Mcp, &settings)?;

    let db = SqliteDatabase::open(&settings.database_path(), settings.database.read_only)?;
    let server = McpServer::new(Arc::new(db));
    server.run().await
}
