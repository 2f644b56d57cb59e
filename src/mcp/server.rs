//! MCP server exposing a SQLite database as tools.

use super::protocol::*;
use super::tools::{get_tools, DESCRIBE_TABLE, LIST_TABLES, QUERY_DATA};
use crate::database::SqliteDatabase;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

const SERVER_NAME: &str = "dbchat-sqlite";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for a SQLite database.
pub struct McpServer {
    database: Arc<SqliteDatabase>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(database: Arc<SqliteDatabase>) -> Self {
        Self { database }
    }

    /// Run the MCP server (reads from stdin, writes to stdout).
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("SQLite MCP server starting");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until the reader closes.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    Some(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"))
                }
            };

            if let Some(response) = response {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        info!("Client closed the connection");
        Ok(())
    }

    /// Handle a single JSON-RPC message. Notifications get no response.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!("Notification: {}", request.method);
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    /// Handle initialize request.
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        to_response(id, &result)
    }

    /// Handle tools/list request.
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: get_tools(),
            next_cursor: None,
        };
        to_response(id, &result)
    }

    /// Handle tools/call request.
    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        &format!("Invalid params: {}", e),
                    )
                }
            },
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
        };

        let args = params.arguments.unwrap_or_else(|| json!({}));
        info!("Tool call: {}", params.name);

        let result = match params.name.as_str() {
            QUERY_DATA => self.tool_query_data(&args).await,
            LIST_TABLES => self.tool_list_tables().await,
            DESCRIBE_TABLE => self.tool_describe_table(&args).await,
            _ => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    &format!("Unknown tool: {}", params.name),
                )
            }
        };

        to_response(id, &result)
    }

    /// Query tool.
    async fn tool_query_data(&self, args: &Value) -> ToolCallResult {
        let sql = match args.get("sql").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => return ToolCallResult::error("Missing 'sql' argument".to_string()),
        };

        let database = Arc::clone(&self.database);
        match tokio::task::spawn_blocking(move || database.execute(&sql)).await {
            Ok(Ok(output)) => ToolCallResult::text(output),
            Ok(Err(e)) => ToolCallResult::error(format!("SQL error: {}", e)),
            Err(e) => ToolCallResult::error(format!("Query task failed: {}", e)),
        }
    }

    /// List tables tool.
    async fn tool_list_tables(&self) -> ToolCallResult {
        let database = Arc::clone(&self.database);
        match tokio::task::spawn_blocking(move || database.list_tables()).await {
            Ok(Ok(tables)) if tables.is_empty() => {
                ToolCallResult::text("The database has no tables.".to_string())
            }
            Ok(Ok(tables)) => ToolCallResult::text(tables.join("\n")),
            Ok(Err(e)) => ToolCallResult::error(format!("Failed to list tables: {}", e)),
            Err(e) => ToolCallResult::error(format!("Query task failed: {}", e)),
        }
    }

    /// Describe table tool.
    async fn tool_describe_table(&self, args: &Value) -> ToolCallResult {
        let table = match args.get("table").and_then(|v| v.as_str()) {
            Some(t) => t.to_string(),
            None => return ToolCallResult::error("Missing 'table' argument".to_string()),
        };

        let database = Arc::clone(&self.database);
        match tokio::task::spawn_blocking(move || database.describe_table(&table)).await {
            Ok(Ok(columns)) => {
                let lines = columns
                    .iter()
                    .map(|c| {
                        let mut line = format!("{} {}", c.name, c.declared_type);
                        if c.not_null {
                            line.push_str(" NOT NULL");
                        }
                        if c.primary_key {
                            line.push_str(" PRIMARY KEY");
                        }
                        line
                    })
                    .collect::<Vec<_>>();
                ToolCallResult::text(lines.join("\n"))
            }
            Ok(Err(e)) => ToolCallResult::error(e.to_string()),
            Err(e) => ToolCallResult::error(format!("Query task failed: {}", e)),
        }
    }
}

fn to_response(id: Option<Value>, result: &impl serde::Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> McpServer {
        let db = SqliteDatabase::in_memory().unwrap();
        db.execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL NOT NULL)")
            .unwrap();
        db.execute("INSERT INTO orders (total) VALUES (1.5), (2.5)")
            .unwrap();
        McpServer::new(Arc::new(db))
    }

    fn request(id: u64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(id, method, params)
    }

    async fn call(server: &McpServer, name: &str, args: Value) -> Value {
        let response = server
            .handle_request(request(
                7,
                "tools/call",
                Some(json!({"name": name, "arguments": args})),
            ))
            .await
            .unwrap();
        response.result.unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let server = server();
        let init = server
            .handle_request(request(1, "initialize", Some(json!({}))))
            .await
            .unwrap();
        assert_eq!(init.result.unwrap()["protocolVersion"], json!(PROTOCOL_VERSION));

        let list = server
            .handle_request(request(2, "tools/list", None))
            .await
            .unwrap();
        let names: Vec<_> = list.result.unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec![QUERY_DATA, LIST_TABLES, DESCRIBE_TABLE]);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let server = server();
        let response = server
            .handle_request(JsonRpcRequest::notification("notifications/initialized"))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_query_data() {
        let server = server();
        let result = call(&server, QUERY_DATA, json!({"sql": "SELECT COUNT(*) FROM orders"})).await;
        assert_eq!(result["content"][0]["text"], json!("(2,)"));
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_query_data_sql_error_is_flagged() {
        let server = server();
        let result = call(&server, QUERY_DATA, json!({"sql": "SELECT * FROM missing"})).await;
        assert_eq!(result["isError"], json!(true));
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("no such table"));
    }

    #[tokio::test]
    async fn test_describe_table() {
        let server = server();
        let result = call(&server, DESCRIBE_TABLE, json!({"table": "orders"})).await;
        assert_eq!(
            result["content"][0]["text"],
            json!("id INTEGER PRIMARY KEY\ntotal REAL NOT NULL")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_and_method() {
        let server = server();
        let response = server
            .handle_request(request(
                3,
                "tools/call",
                Some(json!({"name": "drop_everything"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);

        let response = server
            .handle_request(request(4, "resources/list", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_over_stream() {
        let server = server();
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "not json\n",
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], json!(1));
        assert_eq!(lines[1]["error"]["code"], json!(PARSE_ERROR));
    }
}
