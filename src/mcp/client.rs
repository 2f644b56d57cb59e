//! MCP client built on `rmcp`.
//!
//! `rmcp` multiplexes requests on one peer, so the running service sits
//! behind an async mutex held for the whole exchange: orchestration runs
//! sharing a session never have two calls in flight.

use super::protocol::ToolCallResult;
use crate::error::{DbChatError, Result};
use crate::tools::{ListedTool, ToolServer};
use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    ProtocolVersion, Tool,
};
use rmcp::service::{serve_client, RoleClient, RunningService, ServiceError};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::IntoTransport;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const CLIENT_NAME: &str = "dbchat";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

type Session = RunningService<RoleClient, InitializeRequestParams>;

fn init_params() -> InitializeRequestParams {
    InitializeRequestParams {
        meta: None,
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: CLIENT_NAME.to_string(),
            version: CLIENT_VERSION.to_string(),
            ..Implementation::from_build_env()
        },
    }
}

/// Client session with an MCP tool server.
pub struct McpClient {
    session: Mutex<Option<Session>>,
}

impl McpClient {
    /// Spawn `command` and complete the MCP handshake on its stdio.
    #[instrument(skip(args))]
    pub async fn spawn(command: &str, args: &[String], handshake_timeout: Duration) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        let (transport, _stderr) = TokioChildProcess::builder(cmd).spawn().map_err(|e| {
            DbChatError::ToolServerUnavailable(format!("failed to spawn '{}': {}", command, e))
        })?;

        Self::handshake(transport, handshake_timeout).await
    }

    /// Complete the handshake over existing streams.
    pub async fn connect<R, W>(reader: R, writer: W, handshake_timeout: Duration) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::handshake((reader, writer), handshake_timeout).await
    }

    async fn handshake<T, E, A>(transport: T, timeout: Duration) -> Result<Self>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let session = tokio::time::timeout(timeout, serve_client(init_params(), transport))
            .await
            .map_err(|_| {
                DbChatError::ToolServerUnavailable(format!(
                    "handshake timed out after {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| DbChatError::ToolServerUnavailable(format!("handshake failed: {}", e)))?;

        match session.peer_info() {
            Some(info) => {
                if info.protocol_version != ProtocolVersion::V_2024_11_05 {
                    warn!(
                        "Tool server speaks protocol {:?} (client {:?})",
                        info.protocol_version,
                        ProtocolVersion::V_2024_11_05
                    );
                }
                info!(
                    "Connected to tool server {} {}",
                    info.server_info.name, info.server_info.version
                );
            }
            None => info!("Connected to tool server"),
        }

        Ok(Self {
            session: Mutex::new(Some(session)),
        })
    }

    /// Close the session and stop the child process, if any.
    pub async fn shutdown(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };
        match session.cancel().await {
            Ok(reason) => debug!("Tool server session closed: {:?}", reason),
            Err(e) => warn!("Failed to close tool server session: {}", e),
        }
    }
}

fn closed() -> DbChatError {
    DbChatError::ToolServerUnavailable("tool server session is closed".to_string())
}

/// JSON-RPC error objects are protocol errors; anything else means the
/// transport is gone.
fn service_error(method: &str, error: ServiceError) -> DbChatError {
    match error {
        ServiceError::McpError(data) => DbChatError::ToolServerProtocol(format!(
            "{} failed ({}): {}",
            method, data.code.0, data.message
        )),
        other => DbChatError::ToolServerUnavailable(format!("{} failed: {}", method, other)),
    }
}

fn listed(tool: Tool) -> ListedTool {
    ListedTool {
        name: Some(tool.name.into_owned()),
        description: tool.description.map(|d| d.into_owned()),
        input_schema: Some(Value::Object((*tool.input_schema).clone())),
    }
}

#[async_trait]
impl ToolServer for McpClient {
    async fn list_tools(&self) -> Result<Vec<ListedTool>> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(closed)?;

        // Follows nextCursor until the server stops paginating
        let tools = session
            .list_all_tools()
            .await
            .map_err(|e| service_error("tools/list", e))?;

        Ok(tools.into_iter().map(listed).collect())
    }

    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolCallResult> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(closed)?;

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: Some(arguments.clone()),
            task: None,
        };
        let result = session
            .call_tool(params)
            .await
            .map_err(|e| service_error("tools/call", e))?;

        serde_json::to_value(result)
            .and_then(serde_json::from_value)
            .map_err(|e| {
                DbChatError::ToolServerProtocol(format!("invalid tools/call result: {}", e))
            })
    }
}
