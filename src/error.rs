//! Error types for dbchat.

use thiserror::Error;

/// Library-level error type for dbchat operations.
#[derive(Error, Debug)]
pub enum DbChatError {
    #[error("Tool server unavailable: {0}")]
    ToolServerUnavailable(String),

    #[error("Malformed tool catalog: {0}")]
    MalformedCatalog(String),

    #[error("Tool server protocol error: {0}")]
    ToolServerProtocol(String),

    #[error("Model service error: {0}")]
    ModelService(String),

    #[error("Model quota exceeded: {0}")]
    ModelQuotaExceeded(String),

    #[error("Invalid turn: {0}")]
    InvalidTurn(String),

    #[error("Round budget exceeded: the model was still requesting tools after {0} round(s)")]
    RoundBudgetExceeded(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for dbchat operations.
pub type Result<T> = std::result::Result<T, DbChatError>;
