//! HTTP API server for integration with other systems.
//!
//! Provides `POST /chat` for questions and `GET /health` as a readiness probe.

use crate::agent::ChatResponse;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{HealthStatus, Orchestrator};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
struct AppState {
    /// None when the tool server could not be started.
    orchestrator: Option<Orchestrator>,
    startup_error: Option<String>,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let state = match Orchestrator::new(&settings).await {
        Ok(orchestrator) => AppState {
            orchestrator: Some(orchestrator),
            startup_error: None,
        },
        Err(e) => {
            Output::warning(&format!("Tool server unavailable, /chat will report errors: {}", e));
            AppState {
                orchestrator: None,
                startup_error: Some(e.to_string()),
            }
        }
    };
    let state = Arc::new(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("dbchat API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Chat", "POST /chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(orchestrator) = &state.orchestrator {
        orchestrator.shutdown().await;
    }

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

// === Handlers ===

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    let response = match &state.orchestrator {
        Some(orchestrator) => orchestrator.answer(&req.message).await,
        None => ChatResponse::error(format!(
            "the tool server is not connected ({})",
            state.startup_error.as_deref().unwrap_or("unknown cause")
        )),
    };
    Json(response)
}
