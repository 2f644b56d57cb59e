//! CLI module for dbchat.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::config::{ModelProvider, Settings};
use clap::{Args, Parser, Subcommand};

/// dbchat - Ask questions about a SQLite database
///
/// An LLM answers natural-language questions by running SQL through an MCP
/// tool server.
#[derive(Parser, Debug)]
#[command(name = "dbchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Model selection shared by the commands that talk to the LLM.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// LLM model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model provider (anthropic, openai)
    #[arg(long)]
    pub provider: Option<ModelProvider>,
}

impl ModelArgs {
    /// Apply command-line overrides on top of the loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(provider) = self.provider {
            if provider != settings.model.provider {
                settings.model.model = None;
                settings.model.api_key_env = None;
            }
            settings.model.provider = provider;
        }
        if let Some(model) = &self.model {
            settings.model.model = Some(model.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question about the database
    Ask {
        /// The question to ask
        question: String,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start HTTP API server (POST /chat, GET /health)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start the SQLite MCP tool server on stdio
    Mcp {
        /// Path to the SQLite database
        #[arg(short, long, env = "DBCHAT_DATABASE")]
        database: Option<String>,

        /// Open the database read-only
        #[arg(long)]
        read_only: bool,
    },

    /// List the tools the tool server offers
    Tools,

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
