//! Configuration module for dbchat.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    AgentSettings, DatabaseSettings, ModelProvider, ModelSettings, ServerSettings, Settings,
    ToolServerSettings,
};
