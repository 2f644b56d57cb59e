//! Sequential tool execution.

use super::ToolServer;
use crate::transcript::{ToolInvocationRequest, ToolResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Executes the tool invocations of one round against the tool server.
///
/// Invocations run strictly in the order given, one at a time: a write
/// followed by a read must observe the write. Failures never abort the
/// batch; they come back as `Error: <cause>` results so the model can react.
pub struct ToolDispatcher {
    server: Arc<dyn ToolServer>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    /// Create a dispatcher without a per-call timeout.
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self {
            server,
            timeout: None,
        }
    }

    /// Bound each individual tool call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The underlying tool server session.
    pub fn server(&self) -> &Arc<dyn ToolServer> {
        &self.server
    }

    /// Execute every request in order and collect one result per request.
    pub async fn execute_all(&self, requests: &[ToolInvocationRequest]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute(request).await);
        }
        results
    }

    async fn execute(&self, request: &ToolInvocationRequest) -> ToolResult {
        info!(
            "Calling tool: {} with args: {}",
            request.tool_name,
            serde_json::Value::Object(request.arguments.clone())
        );

        let call = self.server.call_tool(&request.tool_name, &request.arguments);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("Tool {} timed out after {:?}", request.tool_name, limit);
                    return ToolResult::failure(
                        &request.id,
                        format!(
                            "tool '{}' timed out after {}s",
                            request.tool_name,
                            limit.as_secs_f64()
                        ),
                    );
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(result) if result.is_error() => {
                debug!("Tool {} reported an error", request.tool_name);
                ToolResult::failure(&request.id, result.primary_text())
            }
            Ok(result) => {
                let text = result.primary_text();
                debug!("Tool {} returned {} bytes", request.tool_name, text.len());
                ToolResult::success(&request.id, text)
            }
            Err(e) => {
                warn!("Tool {} failed: {}", request.tool_name, e);
                ToolResult::failure(&request.id, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{ToolCallResult, ToolContent};
    use crate::testing::{FakeToolServer, ToolBehavior};
    use serde_json::{json, Map, Value};

    fn request(id: &str, tool: &str, args: Value) -> ToolInvocationRequest {
        ToolInvocationRequest {
            id: id.to_string(),
            tool_name: tool.to_string(),
            arguments: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_executes_in_given_order() {
        let server = Arc::new(
            FakeToolServer::sql()
                .with_tool("a", ToolBehavior::Text("A".into()))
                .with_tool("b", ToolBehavior::Text("B".into()))
                .with_tool("c", ToolBehavior::Text("C".into())),
        );
        let dispatcher = ToolDispatcher::new(server.clone());

        let results = dispatcher
            .execute_all(&[
                request("1", "a", json!({})),
                request("2", "b", json!({})),
                request("3", "c", json!({})),
            ])
            .await;

        assert_eq!(server.call_names(), vec!["a", "b", "c"]);
        let ids: Vec<_> = results.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        let texts: Vec<_> = results.iter().map(|r| r.content_text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_result_ids_follow_requests_despite_latency() {
        let server = Arc::new(
            FakeToolServer::sql()
                .with_tool(
                    "slow",
                    ToolBehavior::Delayed(Duration::from_millis(30), "slow done".into()),
                )
                .with_tool("fast", ToolBehavior::Text("fast done".into())),
        );
        let dispatcher = ToolDispatcher::new(server);

        let results = dispatcher
            .execute_all(&[
                request("t1", "slow", json!({})),
                request("t2", "fast", json!({})),
            ])
            .await;

        assert_eq!(results[0], ToolResult::success("t1", "slow done"));
        assert_eq!(results[1], ToolResult::success("t2", "fast done"));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_text() {
        let server = Arc::new(FakeToolServer::sql());
        let dispatcher = ToolDispatcher::new(server);

        let results = dispatcher
            .execute_all(&[
                request("t1", "drop_everything", json!({})),
                request("t2", "query_data", json!({"sql": "SELECT 1"})),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_error);
        assert!(results[0].content_text.starts_with("Error: "));
        assert!(results[0].content_text.contains("drop_everything"));
        assert!(!results[1].is_error);
    }

    #[tokio::test]
    async fn test_server_flagged_error_is_prefixed() {
        let server = Arc::new(FakeToolServer::sql().with_tool(
            "query_data",
            ToolBehavior::Result(ToolCallResult::error("no such table: orders".into())),
        ));
        let dispatcher = ToolDispatcher::new(server);

        let results = dispatcher
            .execute_all(&[request("t1", "query_data", json!({"sql": "SELECT * FROM orders"}))])
            .await;

        assert_eq!(results[0], ToolResult::failure("t1", "no such table: orders"));
    }

    #[tokio::test]
    async fn test_result_without_text_becomes_empty_string() {
        let server = Arc::new(
            FakeToolServer::sql()
                .with_tool("empty", ToolBehavior::Result(ToolCallResult::default()))
                .with_tool(
                    "image",
                    ToolBehavior::Result(ToolCallResult {
                        content: vec![ToolContent::Unsupported],
                        is_error: None,
                    }),
                ),
        );
        let dispatcher = ToolDispatcher::new(server);

        let results = dispatcher
            .execute_all(&[
                request("t1", "empty", json!({})),
                request("t2", "image", json!({})),
            ])
            .await;

        assert_eq!(results[0], ToolResult::success("t1", ""));
        assert_eq!(results[1], ToolResult::success("t2", ""));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_text() {
        let server = Arc::new(FakeToolServer::sql().with_tool(
            "slow",
            ToolBehavior::Delayed(Duration::from_secs(5), "too late".into()),
        ));
        let dispatcher =
            ToolDispatcher::new(server).with_timeout(Duration::from_millis(10));

        let results = dispatcher
            .execute_all(&[request("t1", "slow", json!({}))])
            .await;

        assert!(results[0].is_error);
        assert!(results[0].content_text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_arguments_are_forwarded() {
        let server = Arc::new(FakeToolServer::sql());
        let dispatcher = ToolDispatcher::new(server.clone());

        dispatcher
            .execute_all(&[request(
                "t1",
                "query_data",
                json!({"sql": "SELECT COUNT(*) FROM orders"}),
            )])
            .await;

        let calls = server.calls();
        let mut expected = Map::new();
        expected.insert("sql".into(), json!("SELECT COUNT(*) FROM orders"));
        assert_eq!(calls, vec![("query_data".to_string(), expected)]);
    }
}
