//! Composition root for dbchat.
//!
//! Owns the tool server session and the reasoning engine and injects both
//! into the [`Agent`]. Nothing here is process-global: every front-end
//! (CLI, HTTP) builds its own orchestrator and shuts it down when done.

use crate::agent::{Agent, AgentResponse, ChatResponse};
use crate::config::{ModelProvider, ModelSettings, Settings};
use crate::engine::{AnthropicEngine, OpenAiEngine, ReasoningEngine};
use crate::error::{DbChatError, Result};
use crate::mcp::McpClient;
use crate::tools::{fetch_catalog, ToolDescriptor, ToolDispatcher, ToolServer};
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Readiness probe payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// The main orchestrator: one tool server session plus one agent.
pub struct Orchestrator {
    agent: Agent,
    server: Arc<dyn ToolServer>,
    session: Option<Arc<McpClient>>,
}

impl Orchestrator {
    /// Build the engine from settings, launch the tool server and connect to it.
    #[instrument(skip_all)]
    pub async fn new(settings: &Settings) -> Result<Self> {
        let engine = create_engine(&settings.model)?;

        let (command, args) = tool_server_command(settings)?;
        info!("Launching tool server: {} {}", command, args.join(" "));
        let session = Arc::new(
            McpClient::spawn(&command, &args, settings.tool_server.handshake_timeout()).await?,
        );

        let mut orchestrator = Self::with_parts(settings, engine, session.clone());
        orchestrator.session = Some(session);
        Ok(orchestrator)
    }

    /// Assemble an orchestrator from already-built collaborators.
    pub fn with_parts(
        settings: &Settings,
        engine: Arc<dyn ReasoningEngine>,
        server: Arc<dyn ToolServer>,
    ) -> Self {
        let mut dispatcher = ToolDispatcher::new(server.clone());
        if let Some(timeout) = settings.agent.tool_timeout() {
            dispatcher = dispatcher.with_timeout(timeout);
        }

        let agent = Agent::new(engine, dispatcher)
            .with_system_prompt(&settings.agent.system_prompt)
            .with_max_output_tokens(settings.model.max_output_tokens)
            .with_max_rounds(settings.agent.max_rounds);

        Self {
            agent,
            server,
            session: None,
        }
    }

    /// Answer one user message. Failures are reported in the response text.
    pub async fn answer(&self, user_text: &str) -> ChatResponse {
        self.agent.answer(user_text).await
    }

    /// Run one query on a fresh transcript.
    pub async fn run(&self, query: &str) -> Result<AgentResponse> {
        self.agent.run(query).await
    }

    /// Run one query continuing `transcript`.
    pub async fn run_with(&self, transcript: &mut Transcript, query: &str) -> Result<AgentResponse> {
        self.agent.run_with(transcript, query).await
    }

    /// The tool catalog as the agent would see it.
    pub async fn catalog(&self) -> Result<Vec<ToolDescriptor>> {
        fetch_catalog(self.server.as_ref()).await
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus::ok()
    }

    /// Close the tool server session.
    pub async fn shutdown(&self) {
        if let Some(session) = &self.session {
            session.shutdown().await;
        }
    }
}

/// Create the reasoning engine selected by `settings`.
pub fn create_engine(settings: &ModelSettings) -> Result<Arc<dyn ReasoningEngine>> {
    let api_key = settings.api_key()?;
    let model = settings.model_name();
    info!("Using {} model {}", settings.provider, model);

    let engine: Arc<dyn ReasoningEngine> = match settings.provider {
        ModelProvider::Anthropic => {
            let mut engine = AnthropicEngine::new(model, &api_key, settings.timeout())?;
            if let Some(base_url) = &settings.base_url {
                engine = engine.with_base_url(base_url);
            }
            Arc::new(engine)
        }
        ModelProvider::OpenAi => match &settings.base_url {
            Some(base_url) => Arc::new(OpenAiEngine::with_base_url(
                model,
                &api_key,
                base_url,
                settings.timeout(),
            )?),
            None => Arc::new(OpenAiEngine::new(model, &api_key, settings.timeout())?),
        },
    };
    Ok(engine)
}

/// Command line for the tool server process.
///
/// Without an explicit command, this binary is relaunched as `dbchat mcp`
/// against the configured database.
pub fn tool_server_command(settings: &Settings) -> Result<(String, Vec<String>)> {
    if let Some(command) = settings.tool_server.command.as_deref().filter(|c| !c.is_empty()) {
        return Ok((command.to_string(), settings.tool_server.args.clone()));
    }

    let exe = std::env::current_exe().map_err(|e| {
        DbChatError::ToolServerUnavailable(format!("cannot locate dbchat executable: {}", e))
    })?;

    let mut args = vec![
        "mcp".to_string(),
        "--database".to_string(),
        settings.database_path().to_string_lossy().into_owned(),
    ];
    if settings.database.read_only {
        args.push("--read-only".to_string());
    }
    Ok((exe.to_string_lossy().into_owned(), args))
}
